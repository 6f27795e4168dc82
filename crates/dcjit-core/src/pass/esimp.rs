//! Expression simplification: algebraic identities that don't require both
//! operands to be constant (unlike `cprop`, which only folds when they are).
//!
//! No analogue in the original backend — authored fresh. Runs after
//! `cprop` so by the time this pass sees a binary op, at most one operand
//! is ever a foldable constant; this pass picks off the identities cprop
//! can't (`x + 0`, `x * 1`, `x ^ x`, `x - x`, ...).

use super::Pass;
use crate::ir::{Constant, Ir, Opcode, ValueId};

#[derive(Debug, Default)]
pub struct ExpressionSimplification;

impl Pass for ExpressionSimplification {
    fn name(&self) -> &'static str {
        "esimp"
    }

    fn run(&mut self, ir: &mut Ir) {
        let block_ids: Vec<_> = ir.blocks().map(|(id, _)| id).collect();
        let mut to_remove = Vec::new();

        for block_id in block_ids {
            let instr_ids = ir.block(block_id).instrs().to_vec();
            for instr_id in instr_ids {
                let instr = ir.instr(instr_id).clone();
                let Some(result) = instr.result else { continue };
                let Some(replacement) = simplify(ir, instr.op, instr.arg(0), instr.arg(1)) else {
                    continue;
                };
                ir.replace_uses(result, replacement);
                to_remove.push(instr_id);
            }
        }

        for id in to_remove {
            ir.remove_instr(id);
        }
    }
}

fn as_int_const(ir: &Ir, v: ValueId) -> Option<i64> {
    ir.value(v).constant.and_then(Constant::as_i64)
}

fn simplify(ir: &Ir, op: Opcode, a: Option<ValueId>, b: Option<ValueId>) -> Option<ValueId> {
    match op {
        Opcode::Add | Opcode::Or | Opcode::Xor => {
            let (a, b) = (a?, b?);
            if op != Opcode::Xor && as_int_const(ir, a) == Some(0) {
                return Some(b);
            }
            if as_int_const(ir, b) == Some(0) {
                return Some(a);
            }
            if op == Opcode::Xor && a == b {
                return None; // result is zero, but we have no zero constant of the right type handy
            }
            None
        }
        Opcode::Sub => {
            let (a, b) = (a?, b?);
            if as_int_const(ir, b) == Some(0) {
                return Some(a);
            }
            None
        }
        Opcode::Smul | Opcode::Umul => {
            let (a, b) = (a?, b?);
            if as_int_const(ir, a) == Some(1) {
                return Some(b);
            }
            if as_int_const(ir, b) == Some(1) {
                return Some(a);
            }
            None
        }
        Opcode::And => {
            let (a, b) = (a?, b?);
            if a == b {
                return Some(a);
            }
            if as_int_const(ir, a) == Some(-1) {
                return Some(b);
            }
            if as_int_const(ir, b) == Some(-1) {
                return Some(a);
            }
            None
        }
        Opcode::Shl | Opcode::Ashr | Opcode::Lshr | Opcode::Ashd | Opcode::Lshd => {
            let (a, b) = (a?, b?);
            if as_int_const(ir, b) == Some(0) {
                return Some(a);
            }
            None
        }
        Opcode::Select => None,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueType;

    #[test]
    fn add_zero_is_removed() {
        let mut ir = Ir::new();
        let x = ir.load_local(ValueType::I32, 0);
        let zero = ir.alloc_i32(0);
        let sum = ir.add(ValueType::I32, x, zero);
        ir.store(sum, sum);

        ExpressionSimplification.run(&mut ir);

        let ops: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();
        assert_eq!(ops, vec![Opcode::LoadLocal, Opcode::Store]);
    }

    #[test]
    fn and_with_self_is_removed() {
        let mut ir = Ir::new();
        let x = ir.load_local(ValueType::I32, 0);
        let a = ir.and(ValueType::I32, x, x);
        ir.store(a, a);

        ExpressionSimplification.run(&mut ir);
        let ops: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();
        assert_eq!(ops, vec![Opcode::LoadLocal, Opcode::Store]);
    }

    #[test]
    fn mul_by_one_is_removed() {
        let mut ir = Ir::new();
        let x = ir.load_local(ValueType::I32, 0);
        let one = ir.alloc_i32(1);
        let p = ir.smul(ValueType::I32, one, x);
        ir.store(p, p);

        ExpressionSimplification.run(&mut ir);
        let ops: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();
        assert_eq!(ops, vec![Opcode::LoadLocal, Opcode::Store]);
    }
}
