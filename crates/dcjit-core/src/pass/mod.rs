//! The fixed-order optimization pipeline: control-flow analysis, load/store
//! elimination, constant propagation, expression simplification, dead-code
//! elimination, and linear-scan register allocation.

mod cfa;
mod cprop;
mod dce;
mod esimp;
mod lse;
mod ra;

pub use cfa::ControlFlowAnalysis;
pub use cprop::ConstantPropagation;
pub use dce::DeadCodeElimination;
pub use esimp::ExpressionSimplification;
pub use lse::LoadStoreElimination;
pub use ra::{RegisterAllocation, RegisterClass};

use crate::ir::Ir;

/// One optimization pass over a module. Passes run in place; `name()` is
/// used for `recc`'s `--pass=` dispatch and its per-pass dump headers.
pub trait Pass {
    fn name(&self) -> &'static str;
    fn run(&mut self, ir: &mut Ir);
}

/// Runs the named passes, in the order given, against `ir`. Unknown names
/// are ignored rather than treated as an error, matching the standalone
/// tool's historical behavior of silently skipping unrecognized pass names.
pub fn run_named(ir: &mut Ir, names: &[&str]) {
    for name in names {
        run_one(ir, name);
    }
}

fn run_one(ir: &mut Ir, name: &str) {
    tracing::trace!(pass = name, "running pass");
    match name {
        "cfa" => ControlFlowAnalysis::default().run(ir),
        "lse" => LoadStoreElimination::default().run(ir),
        "cprop" => ConstantPropagation::default().run(ir),
        "esimp" => ExpressionSimplification::default().run(ir),
        "dce" => DeadCodeElimination::default().run(ir),
        "ra" => RegisterAllocation::default().run(ir),
        _ => tracing::warn!(pass = name, "unknown pass name, skipping"),
    }
}

/// `cfa,lse,cprop,esimp,dce,ra` — the default pipeline order.
pub const DEFAULT_ORDER: &[&str] = &["cfa", "lse", "cprop", "esimp", "dce", "ra"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueType;

    #[test]
    fn default_pipeline_runs_without_panicking() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(1);
        let b = ir.alloc_i32(2);
        let sum = ir.add(ValueType::I32, a, b);
        ir.store(sum, sum);
        run_named(&mut ir, DEFAULT_ORDER);
    }
}
