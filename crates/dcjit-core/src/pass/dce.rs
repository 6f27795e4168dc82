//! Dead-code elimination.
//!
//! Removes instructions whose result has no remaining uses and whose
//! opcode has no side effect, then walks backward through the freed
//! operands so a chain of now-unused definitions collapses in one pass
//! rather than needing DCE to be rerun to fixpoint by the caller.

use rustc_hash::FxHashSet;

use super::Pass;
use crate::ir::{Ir, InstrId, Use};

#[derive(Debug, Default)]
pub struct DeadCodeElimination;

impl Pass for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, ir: &mut Ir) {
        let live_instrs: Vec<InstrId> = ir.blocks().flat_map(|(_, b)| b.instrs().to_vec()).collect();

        let mut dead: FxHashSet<InstrId> = FxHashSet::default();
        let mut worklist: Vec<InstrId> = live_instrs
            .into_iter()
            .filter(|&id| is_dead(ir, id))
            .collect();

        while let Some(id) = worklist.pop() {
            if !dead.insert(id) {
                continue;
            }
            let instr = ir.instr(id).clone();
            for (slot, v) in instr.args_iter() {
                ir.remove_use(v, Use { instr: id, slot });
                if let Some(def) = ir.value(v).def {
                    if !dead.contains(&def) && is_dead(ir, def) {
                        worklist.push(def);
                    }
                }
            }
        }

        for id in dead {
            ir.remove_instr(id);
        }
    }
}

fn is_dead(ir: &Ir, id: InstrId) -> bool {
    let instr = ir.instr(id);
    if instr.op.has_side_effects() {
        return false;
    }
    match instr.result {
        Some(result) => ir.value(result).uses().is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Opcode, ValueType};

    #[test]
    fn unused_chain_is_removed_in_one_pass() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(1);
        let b = ir.alloc_i32(2);
        let sum = ir.add(ValueType::I32, a, b);
        let _unused = ir.neg(ValueType::I32, sum);
        let keep = ir.load_local(ValueType::I32, 0);
        ir.store(keep, keep);

        DeadCodeElimination.run(&mut ir);

        let ops: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();
        assert_eq!(ops, vec![Opcode::LoadLocal, Opcode::Store]);
    }

    #[test]
    fn side_effecting_store_is_kept_even_if_result_unused() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(1);
        ir.store(a, a);
        let before = ir.instr_count();
        DeadCodeElimination.run(&mut ir);
        assert_eq!(ir.instr_count(), before);
    }

    #[test]
    fn dce_is_idempotent() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(1);
        let b = ir.alloc_i32(2);
        let sum = ir.add(ValueType::I32, a, b);
        let _unused = ir.neg(ValueType::I32, sum);
        let keep = ir.load_local(ValueType::I32, 0);
        ir.store(keep, keep);

        DeadCodeElimination.run(&mut ir);
        let once: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();

        DeadCodeElimination.run(&mut ir);
        let twice: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();

        assert_eq!(once, twice);
    }
}
