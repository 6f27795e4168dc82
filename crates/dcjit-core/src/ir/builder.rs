//! Builder surface: insertion-point cursor, block/instruction ops, and the
//! semantic helpers (arithmetic, memory, casts, branches, calls, debug)
//! that emit a fully-wired instruction in one call.

use super::block::BlockId;
use super::instr::{DebugMeta, FallbackMeta, InstrId, Instruction};
use super::module::{InsertPoint, Ir};
use super::opcode::Opcode;
use super::types::ValueType;
use super::value::{Constant, Use, ValueId};

/// Scoped insertion-point save/restore. Passes that need to emit code at a
/// point other than the module's current cursor (e.g. inserting a fixup at
/// the top of a block while iterating its tail) should take a guard rather
/// than hand-restoring the cursor, so an early return can't leave it stale.
pub struct InsertPointGuard<'a> {
    ir: &'a mut Ir,
    saved: InsertPoint,
}

impl<'a> InsertPointGuard<'a> {
    pub fn new(ir: &'a mut Ir, at: InsertPoint) -> InsertPointGuard<'a> {
        let saved = ir.cursor;
        ir.cursor = at;
        InsertPointGuard { ir, saved }
    }

    pub fn ir(&mut self) -> &mut Ir {
        self.ir
    }
}

impl Drop for InsertPointGuard<'_> {
    fn drop(&mut self) {
        self.ir.cursor = self.saved;
    }
}

impl Ir {
    pub fn set_insert_point(&mut self, block: BlockId, before: Option<InstrId>) {
        self.cursor = InsertPoint { block, before };
    }

    pub fn set_insert_point_end(&mut self, block: BlockId) {
        self.cursor = InsertPoint {
            block,
            before: None,
        };
    }

    pub fn set_block_label(&mut self, block: BlockId, label: u32) {
        self.block_mut(block).label = label;
    }

    // -- raw instruction emission -----------------------------------------

    /// Append `instr` at the current cursor, wire its result's def and its
    /// arguments' use lists, and advance nothing (cursor stays put; repeated
    /// calls append in order at `cursor.before` or at block end).
    fn emit(&mut self, mut instr: Instruction, args: &[Option<ValueId>]) -> InstrId {
        let block = self.cursor.block;
        instr.block = block;
        for (i, a) in args.iter().enumerate() {
            instr.args[i] = *a;
        }
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(instr);

        for (slot, a) in args.iter().enumerate() {
            if let Some(v) = a {
                self.push_use(*v, Use {
                    instr: id,
                    slot: slot as u8,
                });
            }
        }

        match self.cursor.before {
            Some(before) => {
                let pos = self.blocks[block.index()]
                    .instrs
                    .iter()
                    .position(|&i| i == before)
                    .unwrap_or(self.blocks[block.index()].instrs.len());
                self.blocks[block.index()].instrs.insert(pos, id);
            }
            None => self.blocks[block.index()].instrs.push(id),
        }
        self.renumber_labels();
        id
    }

    fn emit_void(&mut self, op: Opcode, args: &[Option<ValueId>]) -> InstrId {
        let instr = Instruction::new(op, self.cursor.block);
        self.emit(instr, args)
    }

    fn emit_result(&mut self, op: Opcode, ty: ValueType, args: &[Option<ValueId>]) -> ValueId {
        let instr = Instruction::new(op, self.cursor.block);
        let id = self.emit(instr, args);
        let v = self.alloc_def(ty, id);
        self.instrs[id.index()].result = Some(v);
        v
    }

    // -- constant constructors ---------------------------------------------

    pub fn alloc_i8(&mut self, v: i8) -> ValueId {
        self.alloc_const(Constant::I8(v))
    }
    pub fn alloc_i16(&mut self, v: i16) -> ValueId {
        self.alloc_const(Constant::I16(v))
    }
    pub fn alloc_i32(&mut self, v: i32) -> ValueId {
        self.alloc_const(Constant::I32(v))
    }
    pub fn alloc_i64(&mut self, v: i64) -> ValueId {
        self.alloc_const(Constant::I64(v))
    }
    pub fn alloc_f32(&mut self, v: f32) -> ValueId {
        self.alloc_const(Constant::F32(v))
    }
    pub fn alloc_f64(&mut self, v: f64) -> ValueId {
        self.alloc_const(Constant::F64(v))
    }
    /// A host pointer, represented as a 64-bit integer constant.
    pub fn alloc_ptr(&mut self, v: u64) -> ValueId {
        self.alloc_const(Constant::I64(v as i64))
    }
    pub fn alloc_block_ref(&mut self, block: BlockId) -> ValueId {
        self.alloc_const(Constant::Block(block))
    }

    /// Widen an integer constant to `ty` by zero-extension, used when an
    /// opcode requires both operands at the same width.
    pub fn zext_constant(&mut self, v: ValueId, ty: ValueType) -> ValueId {
        let c = self.value(v).constant.expect("zext_constant on non-constant");
        let bits = c.as_zext_u64().expect("zext_constant on non-integer constant");
        match ty {
            ValueType::I8 => self.alloc_i8(bits as i8),
            ValueType::I16 => self.alloc_i16(bits as i16),
            ValueType::I32 => self.alloc_i32(bits as i32),
            ValueType::I64 => self.alloc_i64(bits as i64),
            _ => panic!("zext_constant to non-integer type {ty:?}"),
        }
    }

    // -- memory --------------------------------------------------------

    pub fn load(&mut self, ty: ValueType, addr: ValueId) -> ValueId {
        self.emit_result(Opcode::Load, ty, &[Some(addr)])
    }
    pub fn store(&mut self, addr: ValueId, v: ValueId) {
        self.emit_void(Opcode::Store, &[Some(addr), Some(v)]);
    }
    pub fn load_fast(&mut self, ty: ValueType, guest_addr: ValueId) -> ValueId {
        self.emit_result(Opcode::LoadFast, ty, &[Some(guest_addr)])
    }
    pub fn store_fast(&mut self, guest_addr: ValueId, v: ValueId) {
        self.emit_void(Opcode::StoreFast, &[Some(guest_addr), Some(v)]);
    }
    pub fn load_slow(&mut self, ty: ValueType, guest_addr: ValueId) -> ValueId {
        self.emit_result(Opcode::LoadSlow, ty, &[Some(guest_addr)])
    }
    pub fn store_slow(&mut self, guest_addr: ValueId, v: ValueId) {
        self.emit_void(Opcode::StoreSlow, &[Some(guest_addr), Some(v)]);
    }
    pub fn load_context(&mut self, ty: ValueType, offset: ValueId) -> ValueId {
        self.emit_result(Opcode::LoadContext, ty, &[Some(offset)])
    }
    pub fn store_context(&mut self, offset: ValueId, v: ValueId) {
        self.emit_void(Opcode::StoreContext, &[Some(offset), Some(v)]);
    }
    pub fn load_local(&mut self, ty: ValueType, offset: u32) -> ValueId {
        let off = self.alloc_i32(offset as i32);
        self.emit_result(Opcode::LoadLocal, ty, &[Some(off)])
    }
    pub fn store_local(&mut self, offset: u32, v: ValueId) {
        let off = self.alloc_i32(offset as i32);
        self.emit_void(Opcode::StoreLocal, &[Some(off), Some(v)]);
    }

    // -- casts -----------------------------------------------------------

    pub fn ftoi(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::FtoI, ty, &[Some(v)])
    }
    pub fn itof(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::ItoF, ty, &[Some(v)])
    }
    pub fn sext(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::Sext, ty, &[Some(v)])
    }
    pub fn zext(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::Zext, ty, &[Some(v)])
    }
    pub fn trunc(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::Trunc, ty, &[Some(v)])
    }
    pub fn fext(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::Fext, ty, &[Some(v)])
    }
    pub fn ftrunc(&mut self, ty: ValueType, v: ValueId) -> ValueId {
        self.emit_result(Opcode::Ftrunc, ty, &[Some(v)])
    }

    pub fn select(&mut self, ty: ValueType, cond: ValueId, t: ValueId, f: ValueId) -> ValueId {
        self.emit_result(Opcode::Select, ty, &[Some(cond), Some(t), Some(f)])
    }

    // -- integer comparisons (result type is always I8, 0/1) -----------

    fn cmp(&mut self, op: Opcode, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(op, ValueType::I8, &[Some(a), Some(b)])
    }
    pub fn cmp_eq(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpEq, a, b)
    }
    pub fn cmp_ne(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpNe, a, b)
    }
    pub fn cmp_sge(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpSge, a, b)
    }
    pub fn cmp_sgt(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpSgt, a, b)
    }
    pub fn cmp_uge(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpUge, a, b)
    }
    pub fn cmp_ugt(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpUgt, a, b)
    }
    pub fn cmp_sle(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpSle, a, b)
    }
    pub fn cmp_slt(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpSlt, a, b)
    }
    pub fn cmp_ule(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpUle, a, b)
    }
    pub fn cmp_ult(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::CmpUlt, a, b)
    }

    // -- float comparisons -----------------------------------------------

    pub fn fcmp_eq(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::FcmpEq, a, b)
    }
    pub fn fcmp_ne(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::FcmpNe, a, b)
    }
    pub fn fcmp_ge(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::FcmpGe, a, b)
    }
    pub fn fcmp_gt(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::FcmpGt, a, b)
    }
    pub fn fcmp_le(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::FcmpLe, a, b)
    }
    pub fn fcmp_lt(&mut self, a: ValueId, b: ValueId) -> ValueId {
        self.cmp(Opcode::FcmpLt, a, b)
    }

    // -- integer math ------------------------------------------------------

    pub fn add(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Add, ty, &[Some(a), Some(b)])
    }
    pub fn sub(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Sub, ty, &[Some(a), Some(b)])
    }
    pub fn smul(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Smul, ty, &[Some(a), Some(b)])
    }
    pub fn umul(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Umul, ty, &[Some(a), Some(b)])
    }
    pub fn div(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Div, ty, &[Some(a), Some(b)])
    }
    pub fn neg(&mut self, ty: ValueType, a: ValueId) -> ValueId {
        self.emit_result(Opcode::Neg, ty, &[Some(a)])
    }
    pub fn abs(&mut self, ty: ValueType, a: ValueId) -> ValueId {
        self.emit_result(Opcode::Abs, ty, &[Some(a)])
    }

    // -- float math -----------------------------------------------------

    pub fn fadd(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Fadd, ty, &[Some(a), Some(b)])
    }
    pub fn fsub(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Fsub, ty, &[Some(a), Some(b)])
    }
    pub fn fmul(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Fmul, ty, &[Some(a), Some(b)])
    }
    pub fn fdiv(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Fdiv, ty, &[Some(a), Some(b)])
    }
    pub fn fneg(&mut self, ty: ValueType, a: ValueId) -> ValueId {
        self.emit_result(Opcode::Fneg, ty, &[Some(a)])
    }
    pub fn fabs(&mut self, ty: ValueType, a: ValueId) -> ValueId {
        self.emit_result(Opcode::Fabs, ty, &[Some(a)])
    }
    pub fn sqrt(&mut self, ty: ValueType, a: ValueId) -> ValueId {
        self.emit_result(Opcode::Sqrt, ty, &[Some(a)])
    }

    // -- bitwise and shifts ------------------------------------------------

    pub fn and(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::And, ty, &[Some(a), Some(b)])
    }
    pub fn or(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Or, ty, &[Some(a), Some(b)])
    }
    pub fn xor(&mut self, ty: ValueType, a: ValueId, b: ValueId) -> ValueId {
        self.emit_result(Opcode::Xor, ty, &[Some(a), Some(b)])
    }
    pub fn not(&mut self, ty: ValueType, a: ValueId) -> ValueId {
        self.emit_result(Opcode::Not, ty, &[Some(a)])
    }
    pub fn shl(&mut self, ty: ValueType, a: ValueId, n: ValueId) -> ValueId {
        self.emit_result(Opcode::Shl, ty, &[Some(a), Some(n)])
    }
    /// Convenience wrapper over [`Ir::shl`] with an immediate shift amount;
    /// not a distinct opcode.
    pub fn shli(&mut self, ty: ValueType, a: ValueId, n: i32) -> ValueId {
        let n = self.alloc_i32(n);
        self.shl(ty, a, n)
    }
    pub fn ashr(&mut self, ty: ValueType, a: ValueId, n: ValueId) -> ValueId {
        self.emit_result(Opcode::Ashr, ty, &[Some(a), Some(n)])
    }
    pub fn ashri(&mut self, ty: ValueType, a: ValueId, n: i32) -> ValueId {
        let n = self.alloc_i32(n);
        self.ashr(ty, a, n)
    }
    pub fn lshr(&mut self, ty: ValueType, a: ValueId, n: ValueId) -> ValueId {
        self.emit_result(Opcode::Lshr, ty, &[Some(a), Some(n)])
    }
    pub fn lshri(&mut self, ty: ValueType, a: ValueId, n: i32) -> ValueId {
        let n = self.alloc_i32(n);
        self.lshr(ty, a, n)
    }
    /// Shift direction (left vs. right) is chosen at runtime by the sign of
    /// `n`: SH-4's SHAD.
    pub fn ashd(&mut self, ty: ValueType, a: ValueId, n: ValueId) -> ValueId {
        self.emit_result(Opcode::Ashd, ty, &[Some(a), Some(n)])
    }
    /// Logical counterpart of [`Ir::ashd`]: SH-4's SHLD.
    pub fn lshd(&mut self, ty: ValueType, a: ValueId, n: ValueId) -> ValueId {
        self.emit_result(Opcode::Lshd, ty, &[Some(a), Some(n)])
    }

    // -- control flow --------------------------------------------------

    pub fn label(&mut self, block: ValueId) {
        self.emit_void(Opcode::Label, &[Some(block)]);
    }
    pub fn branch(&mut self, target: ValueId) {
        self.emit_void(Opcode::Branch, &[Some(target)]);
    }
    pub fn branch_true(&mut self, cond: ValueId, target: ValueId) {
        self.emit_void(Opcode::BranchTrue, &[Some(cond), Some(target)]);
    }
    pub fn branch_false(&mut self, cond: ValueId, target: ValueId) {
        self.emit_void(Opcode::BranchFalse, &[Some(cond), Some(target)]);
    }

    // -- calls ------------------------------------------------------------

    pub fn call(&mut self, target: ValueId, a0: Option<ValueId>, a1: Option<ValueId>) {
        self.emit_void(Opcode::Call, &[Some(target), a0, a1]);
    }
    pub fn call_cond(
        &mut self,
        cond: ValueId,
        target: ValueId,
        a0: Option<ValueId>,
        a1: Option<ValueId>,
    ) {
        self.emit_void(Opcode::CallCond, &[Some(cond), Some(target), a0, a1]);
    }
    pub fn call_noreturn(&mut self, target: ValueId, a0: Option<ValueId>, a1: Option<ValueId>) {
        self.emit_void(Opcode::CallNoreturn, &[Some(target), a0, a1]);
    }
    pub fn call_fallback(&mut self, target: ValueId, raw_instr: u32, guest_addr: u32) {
        let id = self.emit_void(Opcode::CallFallback, &[Some(target)]);
        self.instrs[id.index()].fallback = Some(FallbackMeta {
            raw_instr,
            guest_addr,
        });
    }

    // -- debug ------------------------------------------------------------

    pub fn debug_info(&mut self, desc: impl Into<String>, guest_addr: u32, raw_instr: u32) {
        let id = self.emit_void(Opcode::DebugInfo, &[]);
        self.instrs[id.index()].debug = Some(DebugMeta {
            desc: desc.into(),
            guest_addr,
            raw_instr,
        });
    }
    pub fn debug_break(&mut self) {
        self.emit_void(Opcode::DebugBreak, &[]);
    }
    pub fn assert_lt(&mut self, a: ValueId, b: ValueId) {
        self.emit_void(Opcode::AssertLt, &[Some(a), Some(b)]);
    }
}
