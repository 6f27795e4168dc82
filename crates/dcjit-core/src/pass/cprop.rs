//! Constant propagation: fold pure arithmetic/comparison instructions whose
//! operands are all already constants into a single constant value.
//!
//! Grounded on the original backend's constant-folding pass, generalized to
//! this crate's op set. Integer ops fold in a widened `i64`/`u64` and
//! truncate back to the result width; float ops fold in `f64` and narrow
//! back to `f32` when the result type calls for it. Division by zero is
//! left unfolded — the fault belongs to the compiled code at run time, not
//! to the optimizer.

use super::Pass;
use crate::ir::{Constant, Ir, Opcode, ValueId, ValueType};

#[derive(Debug, Default)]
pub struct ConstantPropagation;

impl Pass for ConstantPropagation {
    fn name(&self) -> &'static str {
        "cprop"
    }

    fn run(&mut self, ir: &mut Ir) {
        let block_ids: Vec<_> = ir.blocks().map(|(id, _)| id).collect();
        let mut to_remove = Vec::new();

        for block_id in block_ids {
            let instr_ids = ir.block(block_id).instrs().to_vec();
            for instr_id in instr_ids {
                let instr = ir.instr(instr_id).clone();
                let Some(result) = instr.result else { continue };
                let ty = ir.value(result).ty;

                let args: Option<Vec<Constant>> = instr
                    .args_iter()
                    .map(|(_, v)| ir.value(v).constant)
                    .collect();
                let Some(args) = args else { continue };

                if let Some(folded) = fold(instr.op, ty, &args) {
                    let new_value = alloc_constant(ir, folded);
                    ir.replace_uses(result, new_value);
                    to_remove.push(instr_id);
                }
            }
        }

        for id in to_remove {
            ir.remove_instr(id);
        }
    }
}

fn alloc_constant(ir: &mut Ir, c: Constant) -> ValueId {
    match c {
        Constant::I8(v) => ir.alloc_i8(v),
        Constant::I16(v) => ir.alloc_i16(v),
        Constant::I32(v) => ir.alloc_i32(v),
        Constant::I64(v) => ir.alloc_i64(v),
        Constant::F32(v) => ir.alloc_f32(v),
        Constant::F64(v) => ir.alloc_f64(v),
        Constant::Block(b) => ir.alloc_block_ref(b),
    }
}

fn narrow_int(ty: ValueType, v: i64) -> Constant {
    match ty {
        ValueType::I8 => Constant::I8(v as i8),
        ValueType::I16 => Constant::I16(v as i16),
        ValueType::I32 => Constant::I32(v as i32),
        ValueType::I64 => Constant::I64(v),
        _ => unreachable!("non-integer result type for integer fold"),
    }
}

fn narrow_float(ty: ValueType, v: f64) -> Constant {
    match ty {
        ValueType::F32 => Constant::F32(v as f32),
        ValueType::F64 => Constant::F64(v),
        _ => unreachable!("non-float result type for float fold"),
    }
}

fn bool_const(b: bool) -> Constant {
    Constant::I8(b as i8)
}

fn fold(op: Opcode, result_ty: ValueType, args: &[Constant]) -> Option<Constant> {
    match (op, args) {
        (Opcode::Add, [a, b]) => Some(narrow_int(result_ty, a.as_i64()? + b.as_i64()?)),
        (Opcode::Sub, [a, b]) => Some(narrow_int(result_ty, a.as_i64()?.wrapping_sub(b.as_i64()?))),
        (Opcode::Smul, [a, b]) => Some(narrow_int(result_ty, a.as_i64()?.wrapping_mul(b.as_i64()?))),
        (Opcode::Umul, [a, b]) => {
            let prod = (a.as_zext_u64()?).wrapping_mul(b.as_zext_u64()?);
            Some(narrow_int(result_ty, prod as i64))
        }
        (Opcode::Div, [a, b]) => {
            let (a, b) = (a.as_i64()?, b.as_i64()?);
            if b == 0 {
                return None;
            }
            Some(narrow_int(result_ty, a.wrapping_div(b)))
        }
        (Opcode::Neg, [a]) => Some(narrow_int(result_ty, a.as_i64()?.wrapping_neg())),
        (Opcode::Abs, [a]) => Some(narrow_int(result_ty, a.as_i64()?.wrapping_abs())),

        (Opcode::Fadd, [a, b]) => Some(narrow_float(result_ty, a.as_f64()? + b.as_f64()?)),
        (Opcode::Fsub, [a, b]) => Some(narrow_float(result_ty, a.as_f64()? - b.as_f64()?)),
        (Opcode::Fmul, [a, b]) => Some(narrow_float(result_ty, a.as_f64()? * b.as_f64()?)),
        (Opcode::Fdiv, [a, b]) => {
            let bb = b.as_f64()?;
            if bb == 0.0 {
                return None;
            }
            Some(narrow_float(result_ty, a.as_f64()? / bb))
        }
        (Opcode::Fneg, [a]) => Some(narrow_float(result_ty, -a.as_f64()?)),
        (Opcode::Fabs, [a]) => Some(narrow_float(result_ty, a.as_f64()?.abs())),
        (Opcode::Sqrt, [a]) => Some(narrow_float(result_ty, a.as_f64()?.sqrt())),

        (Opcode::And, [a, b]) => Some(narrow_int(result_ty, a.as_zext_u64()? as i64 & b.as_zext_u64()? as i64)),
        (Opcode::Or, [a, b]) => Some(narrow_int(result_ty, a.as_zext_u64()? as i64 | b.as_zext_u64()? as i64)),
        (Opcode::Xor, [a, b]) => Some(narrow_int(result_ty, a.as_zext_u64()? as i64 ^ b.as_zext_u64()? as i64)),
        (Opcode::Not, [a]) => Some(narrow_int(result_ty, !(a.as_zext_u64()? as i64))),
        (Opcode::Shl, [a, n]) => Some(narrow_int(result_ty, a.as_i64()?.wrapping_shl(n.as_i64()? as u32))),
        (Opcode::Ashr, [a, n]) => Some(narrow_int(result_ty, a.as_i64()?.wrapping_shr(n.as_i64()? as u32))),
        (Opcode::Lshr, [a, n]) => {
            let shifted = (a.as_zext_u64()?).wrapping_shr(n.as_i64()? as u32);
            Some(narrow_int(result_ty, shifted as i64))
        }

        (Opcode::CmpEq, [a, b]) => Some(bool_const(a.as_i64()? == b.as_i64()?)),
        (Opcode::CmpNe, [a, b]) => Some(bool_const(a.as_i64()? != b.as_i64()?)),
        (Opcode::CmpSge, [a, b]) => Some(bool_const(a.as_i64()? >= b.as_i64()?)),
        (Opcode::CmpSgt, [a, b]) => Some(bool_const(a.as_i64()? > b.as_i64()?)),
        (Opcode::CmpUge, [a, b]) => Some(bool_const(a.as_zext_u64()? >= b.as_zext_u64()?)),
        (Opcode::CmpUgt, [a, b]) => Some(bool_const(a.as_zext_u64()? > b.as_zext_u64()?)),
        (Opcode::CmpSle, [a, b]) => Some(bool_const(a.as_i64()? <= b.as_i64()?)),
        (Opcode::CmpSlt, [a, b]) => Some(bool_const(a.as_i64()? < b.as_i64()?)),
        (Opcode::CmpUle, [a, b]) => Some(bool_const(a.as_zext_u64()? <= b.as_zext_u64()?)),
        (Opcode::CmpUlt, [a, b]) => Some(bool_const(a.as_zext_u64()? < b.as_zext_u64()?)),

        (Opcode::FcmpEq, [a, b]) => Some(bool_const(a.as_f64()? == b.as_f64()?)),
        (Opcode::FcmpNe, [a, b]) => Some(bool_const(a.as_f64()? != b.as_f64()?)),
        (Opcode::FcmpGe, [a, b]) => Some(bool_const(a.as_f64()? >= b.as_f64()?)),
        (Opcode::FcmpGt, [a, b]) => Some(bool_const(a.as_f64()? > b.as_f64()?)),
        (Opcode::FcmpLe, [a, b]) => Some(bool_const(a.as_f64()? <= b.as_f64()?)),
        (Opcode::FcmpLt, [a, b]) => Some(bool_const(a.as_f64()? < b.as_f64()?)),

        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_constant_addition() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(2);
        let b = ir.alloc_i32(3);
        let sum = ir.add(ValueType::I32, a, b);
        ir.store(sum, sum);

        ConstantPropagation.run(&mut ir);

        // the add is gone; the store's operands now point at a folded 5
        let remaining: Vec<_> = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).op)
            .collect();
        assert_eq!(remaining, vec![Opcode::Store]);
        let store = ir
            .blocks()
            .flat_map(|(_, b)| b.instrs().to_vec())
            .map(|id| ir.instr(id).clone())
            .next()
            .unwrap();
        let folded = ir.value(store.arg(0).unwrap()).constant.unwrap();
        assert_eq!(folded, Constant::I32(5));
    }

    #[test]
    fn leaves_division_by_zero_unfolded() {
        let mut ir = Ir::new();
        let a = ir.alloc_i32(1);
        let z = ir.alloc_i32(0);
        let q = ir.div(ValueType::I32, a, z);
        ir.store(q, q);

        let before = ir.instr_count();
        ConstantPropagation.run(&mut ir);
        assert_eq!(ir.instr_count(), before);
    }
}
