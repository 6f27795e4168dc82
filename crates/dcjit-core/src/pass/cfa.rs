//! Control-flow analysis: derives block-to-block edges from branch
//! instructions.
//!
//! Grounded directly on the original pass: `branch` adds a direct edge to
//! its block-constant target; `branch.true`/`branch.false` add an edge to
//! the target (when it's a block constant) *and* always add a fall-through
//! edge to the lexically next block, since the conditional can fall off the
//! end of the current block when the condition doesn't hold.

use super::Pass;
use crate::ir::{BlockId, Ir, Opcode, Value};

#[derive(Debug, Default)]
pub struct ControlFlowAnalysis;

impl Pass for ControlFlowAnalysis {
    fn name(&self) -> &'static str {
        "cfa"
    }

    fn run(&mut self, ir: &mut Ir) {
        ir.clear_edges();
        let block_ids: Vec<BlockId> = ir.blocks().map(|(id, _)| id).collect();

        for (pos, &block_id) in block_ids.iter().enumerate() {
            let next_block = block_ids.get(pos + 1).copied();
            let instr_ids: Vec<_> = ir.block(block_id).instrs().to_vec();

            for instr_id in instr_ids {
                let instr = ir.instr(instr_id).clone();
                match instr.op {
                    Opcode::Branch => {
                        if let Some(target) = instr.arg(0).and_then(|v| block_const(ir, v)) {
                            ir.add_edge(block_id, target);
                        }
                    }
                    Opcode::BranchTrue | Opcode::BranchFalse => {
                        if let Some(target) = instr.arg(1).and_then(|v| block_const(ir, v)) {
                            ir.add_edge(block_id, target);
                        }
                        if let Some(next) = next_block {
                            ir.add_edge(block_id, next);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn block_const(ir: &Ir, value: crate::ir::ValueId) -> Option<BlockId> {
    let v: &Value = ir.value(value);
    match v.constant {
        Some(crate::ir::Constant::Block(b)) => Some(b),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditional_branch_gets_target_and_fallthrough_edges() {
        let mut ir = Ir::new();
        let (b0, _) = ir.blocks().next().unwrap();
        let b1 = ir.append_block();
        let b2 = ir.append_block();

        ir.set_insert_point_end(b0);
        let cond = ir.alloc_i8(1);
        let target = ir.alloc_block_ref(b2);
        ir.branch_true(cond, target);

        ir.set_insert_point_end(b1);
        let t = ir.alloc_i32(0);
        ir.store(t, t);

        ir.set_insert_point_end(b2);
        let t2 = ir.alloc_i32(0);
        ir.store(t2, t2);

        let mut cfa = ControlFlowAnalysis;
        cfa.run(&mut ir);

        let succs = ir.block(b0).succs();
        assert!(succs.contains(&b2));
        assert!(succs.contains(&b1));
        assert_eq!(succs.len(), 2);
    }
}
