//! Dreamcast JIT core
//!
//! The guest-agnostic half of a dynamic binary translator for SH-4 (with a
//! parallel ARMv3 front end):
//! - **IR**: arena-backed SSA-like value/instruction/block model with an
//!   insertion-point cursor and a textual write/read contract (`ir` module).
//! - **Pass pipeline**: control-flow analysis, load/store elimination,
//!   constant propagation, expression simplification, dead-code elimination,
//!   and linear-scan register allocation (`pass` module).
//! - **Engine**: metadata/code caches, forward and reverse address lookups,
//!   edge patching, and exception-driven fastmem recovery (`engine`,
//!   `cache` modules).
//! - **Front ends**: SH-4 and ARMv3 basic-block analyzers and translators
//!   (`frontend` module).
//!
//! The host code generator, guest memory map, and dispatcher loop are
//! external collaborators reached only through the traits in `dispatch` and
//! `backend`.

#![warn(rust_2018_idioms)]
#![allow(clippy::too_many_arguments)]

/// Host back end capability trait and test/placeholder implementations.
pub mod backend;

/// Block metadata, compile units, compiled code, and patchable edges.
pub mod cache;

/// External dispatcher contract: guest memory and dispatch-table traits.
pub mod dispatch;

/// The JIT engine: compile/invalidate/flush state machine.
pub mod engine;

/// Error taxonomy shared across the crate.
pub mod error;

/// SH-4 and ARMv3 basic-block analyzers and translators.
pub mod frontend;

/// Arena-allocated SSA-like intermediate representation.
pub mod ir;

/// The fixed-order optimization pipeline.
pub mod pass;

pub use backend::{HostBackend, StubBackend};
pub use cache::{BlockMeta, BranchType, Code, CodeEdge, CompileRef, CompileUnit, CompileUnitId, Translation};
pub use dispatch::{DispatchTable, GuestMemory};
pub use engine::{JitConfig, JitEngine};
pub use error::{AnalyzeError, CacheError, JitError};
pub use frontend::{ArmV3Frontend, Frontend, Sh4Frontend};
pub use ir::{Block, BlockId, Instruction, Ir, Opcode, RegSlot, Use, Value, ValueId, ValueType};
