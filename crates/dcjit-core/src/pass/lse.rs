//! Load/store elimination.
//!
//! No analogue in the original backend (its local/context slots were never
//! redundancy-eliminated at the IR level) — authored fresh against this
//! crate's op set. Per block: a redundant `load.local`/`load.context`
//! following a `store`/`load` to the same, provably-disjoint slot is
//! replaced by the previously known value and removed; a `load.fast`/
//! `load.slow` is only eliminated when its address is the *same* value
//! (pointer identity, not just equal address arithmetic) as a preceding
//! access, since guest addresses can alias in ways static offsets cannot.
//! A call instruction invalidates everything it might have touched, since
//! it can run arbitrary guest code.

use rustc_hash::FxHashMap;

use super::Pass;
use crate::ir::{BlockId, Ir, Opcode, ValueId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Kind {
    Local,
    Context,
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SlotKey {
    Offset(i64),
    Addr(ValueId),
}

#[derive(Debug, Default)]
pub struct LoadStoreElimination;

impl Pass for LoadStoreElimination {
    fn name(&self) -> &'static str {
        "lse"
    }

    fn run(&mut self, ir: &mut Ir) {
        let block_ids: Vec<BlockId> = ir.blocks().map(|(id, _)| id).collect();
        for block_id in block_ids {
            eliminate_in_block(ir, block_id);
        }
    }
}

fn slot_key(ir: &Ir, kind: Kind, addr_or_offset: ValueId) -> SlotKey {
    match kind {
        Kind::Local | Kind::Context => {
            let offset = ir
                .value(addr_or_offset)
                .constant
                .and_then(|c| c.as_i64())
                .expect("local/context slot address must be a constant offset");
            SlotKey::Offset(offset)
        }
        Kind::Fast | Kind::Slow => SlotKey::Addr(addr_or_offset),
    }
}

fn eliminate_in_block(ir: &mut Ir, block_id: BlockId) {
    let mut known: FxHashMap<(Kind, SlotKey), ValueId> = FxHashMap::default();
    let mut to_remove = Vec::new();
    let instr_ids = ir.block(block_id).instrs().to_vec();

    for instr_id in instr_ids {
        let instr = ir.instr(instr_id).clone();
        let load_kind = match instr.op {
            Opcode::LoadLocal => Some(Kind::Local),
            Opcode::LoadContext => Some(Kind::Context),
            Opcode::LoadFast => Some(Kind::Fast),
            Opcode::LoadSlow => Some(Kind::Slow),
            _ => None,
        };
        if let Some(kind) = load_kind {
            let addr = instr.arg(0).expect("load has an address/offset operand");
            let key = (kind, slot_key(ir, kind, addr));
            if let Some(&prev) = known.get(&key) {
                if let Some(result) = instr.result {
                    ir.replace_uses(result, prev);
                    to_remove.push(instr_id);
                }
            } else if let Some(result) = instr.result {
                known.insert(key, result);
            }
            continue;
        }

        let store_kind = match instr.op {
            Opcode::StoreLocal => Some(Kind::Local),
            Opcode::StoreContext => Some(Kind::Context),
            Opcode::StoreFast => Some(Kind::Fast),
            Opcode::StoreSlow => Some(Kind::Slow),
            _ => None,
        };
        if let Some(kind) = store_kind {
            let addr = instr.arg(0).expect("store has an address/offset operand");
            let value = instr.arg(1).expect("store has a value operand");
            if matches!(kind, Kind::Fast | Kind::Slow) {
                // Can't prove a guest store doesn't alias a different address
                // expression tracked under the same kind; drop all of them.
                known.retain(|(k, _), _| *k != kind);
            }
            known.insert((kind, slot_key(ir, kind, addr)), value);
            continue;
        }

        if matches!(
            instr.op,
            Opcode::Call | Opcode::CallCond | Opcode::CallNoreturn | Opcode::CallFallback
        ) {
            known.clear();
        }
    }

    for id in to_remove {
        ir.remove_instr(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueType;

    #[test]
    fn redundant_local_load_is_eliminated() {
        let mut ir = Ir::new();
        let v = ir.alloc_i32(42);
        ir.store_local(0, v);
        let a = ir.load_local(ValueType::I32, 0);
        let b = ir.load_local(ValueType::I32, 0);
        ir.store(a, b);

        let before = ir.instr_count();
        LoadStoreElimination.run(&mut ir);
        assert!(ir.instr_count() < before);
    }

    #[test]
    fn redundant_context_load_collapses_to_one() {
        let mut ir = Ir::new();
        let off = ir.alloc_i32(16);
        let v = ir.alloc_i32(7);
        ir.store_context(off, v);
        let a = ir.load_context(ValueType::I32, off);
        let b = ir.load_context(ValueType::I32, off);
        ir.store(a, b);

        let loads_before = ir
            .blocks()
            .flat_map(|(_, bl)| bl.instrs().to_vec())
            .filter(|id| ir.instr(*id).op == Opcode::LoadContext)
            .count();
        assert_eq!(loads_before, 2);

        LoadStoreElimination.run(&mut ir);

        let loads_after = ir
            .blocks()
            .flat_map(|(_, bl)| bl.instrs().to_vec())
            .filter(|id| ir.instr(*id).op == Opcode::LoadContext)
            .count();
        assert_eq!(loads_after, 1);
    }

    #[test]
    fn call_invalidates_known_loads() {
        let mut ir = Ir::new();
        let v = ir.alloc_i32(1);
        ir.store_local(0, v);
        let target = ir.alloc_ptr(0x1000);
        ir.call(target, None, None);
        let a = ir.load_local(ValueType::I32, 0);
        ir.store(a, a);

        let before = ir.instr_count();
        LoadStoreElimination.run(&mut ir);
        // the load after the call is not known redundant, so nothing removed
        assert_eq!(ir.instr_count(), before);
    }
}
