//! Arena-backed SSA-like intermediate representation.
//!
//! Values, instructions, and blocks live in dense arenas addressed by
//! [`ValueId`]/[`InstrId`]/[`BlockId`]. Each value keeps an explicit list of
//! every instruction argument slot that references it ([`Use`]), so
//! [`Ir::replace_uses`] can rewrite every use of a value in time proportional
//! to its use count rather than scanning the whole module.
//!
//! The module round-trips through a textual form (`display`/`parser`): the
//! golden property is `parser::parse(&module.to_string())` producing a
//! module structurally equal to `module`.

mod block;
mod builder;
mod display;
mod instr;
mod module;
mod opcode;
mod parser;
mod types;
mod value;

pub use block::{Block, BlockId, Edge};
pub use builder::InsertPointGuard;
pub use instr::{DebugMeta, FallbackMeta, InstrId, Instruction};
pub use module::{InsertPoint, Ir, Local};
pub use opcode::Opcode;
pub use parser::{parse, IrParseError};
pub use types::ValueType;
pub use value::{Constant, RegSlot, Use, Value, ValueId};
