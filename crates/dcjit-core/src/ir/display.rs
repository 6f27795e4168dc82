//! Textual form of an [`Ir`] module.
//!
//! Grammar (see `parser.rs` for the matching reader):
//!
//! ```text
//! consts:
//!   %3: i32 = 42
//!
//! locals:
//!   0: i32
//!
//! block 0:
//!   %7:i32 = add %3, %3
//!   store %7, %3
//!   branch %9
//!
//! edges:
//!   0 -> 1
//! ```
//!
//! Every value (constant or instruction result) has exactly one id, the
//! value's arena index, shared across both the `consts:` prologue and the
//! `%N` operand references inside blocks. Constants are predeclared rather
//! than inlined at each use so that sharing between uses round-trips.

use std::fmt;

use super::module::Ir;
use super::value::{Constant, Value, ValueId};

impl fmt::Display for Ir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let consts: Vec<(ValueId, &Value)> = self
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_constant())
            .map(|(i, v)| (ValueId(i as u32), v))
            .collect();

        if !consts.is_empty() {
            writeln!(f, "consts:")?;
            for (id, v) in &consts {
                let lit = match v.constant.unwrap() {
                    Constant::I8(n) => n.to_string(),
                    Constant::I16(n) => n.to_string(),
                    Constant::I32(n) => n.to_string(),
                    Constant::I64(n) => n.to_string(),
                    Constant::F32(n) => format!("{n:?}"),
                    Constant::F64(n) => format!("{n:?}"),
                    Constant::Block(b) => self.block(b).label.to_string(),
                };
                writeln!(f, "  %{}: {} = {}", id.0, v.ty, lit)?;
            }
            writeln!(f)?;
        }

        if !self.locals.is_empty() {
            writeln!(f, "locals:")?;
            for local in &self.locals {
                writeln!(f, "  {}: {}", local.offset, local.ty)?;
            }
            writeln!(f)?;
        }

        for (bi, (_, block)) in self.blocks().enumerate() {
            writeln!(f, "block {}:", block.label)?;
            for &instr_id in &block.instrs {
                let instr = self.instr(instr_id);
                write!(f, "  ")?;
                if let Some(result) = instr.result {
                    write!(f, "%{}:{} = ", result.0, self.value(result).ty)?;
                }
                write!(f, "{}", instr.op)?;
                let args: Vec<String> = instr
                    .args_iter()
                    .map(|(_, v)| format!("%{}", v.0))
                    .collect();
                if !args.is_empty() {
                    write!(f, " {}", args.join(", "))?;
                }
                if let Some(fb) = &instr.fallback {
                    write!(
                        f,
                        " ; fallback raw=0x{:08x} addr=0x{:08x}",
                        fb.raw_instr, fb.guest_addr
                    )?;
                }
                if let Some(dbg) = &instr.debug {
                    write!(
                        f,
                        " ; debug desc={:?} addr=0x{:08x} raw=0x{:08x}",
                        dbg.desc, dbg.guest_addr, dbg.raw_instr
                    )?;
                }
                writeln!(f)?;
            }
            if bi + 1 != self.blocks.len() {
                writeln!(f)?;
            }
        }

        if !self.edges.is_empty() {
            writeln!(f)?;
            writeln!(f, "edges:")?;
            for e in &self.edges {
                writeln!(
                    f,
                    "  {} -> {}",
                    self.block(e.src).label,
                    self.block(e.dst).label
                )?;
            }
        }

        Ok(())
    }
}
