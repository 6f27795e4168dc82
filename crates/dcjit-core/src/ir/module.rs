//! The IR module: value/instruction/block arenas plus an insertion cursor.

use rustc_hash::FxHashMap;

use super::block::{Block, BlockId, Edge};
use super::instr::{Instruction, InstrId};
use super::types::ValueType;
use super::value::{Constant, Use, Value, ValueId};

/// A spill slot reserved in the current compile unit's stack frame.
#[derive(Debug, Clone, Copy)]
pub struct Local {
    pub ty: ValueType,
    pub offset: u32,
}

/// Where the next `append_instr`/`insert_block` lands. Builder methods that
/// need a scoped cursor move should use [`super::builder::InsertPointGuard`]
/// rather than saving/restoring this by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    pub block: BlockId,
    /// Insert before this instruction, or at block end if `None`.
    pub before: Option<InstrId>,
}

/// Arena-backed SSA-like IR for one compile unit.
///
/// Values, instructions, and blocks are addressed by dense, stable indices
/// (`ValueId`/`InstrId`/`BlockId`) rather than pointers, so the whole module
/// can be freely moved, cloned into a textual form, and parsed back without
/// any pointer-fixup step.
#[derive(Debug, Clone)]
pub struct Ir {
    pub(crate) values: Vec<Value>,
    pub(crate) instrs: Vec<Instruction>,
    pub(crate) blocks: Vec<Block>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) locals: Vec<Local>,
    pub(crate) locals_size: u32,
    pub cursor: InsertPoint,
}

impl Ir {
    pub fn new() -> Ir {
        let mut ir = Ir {
            values: Vec::new(),
            instrs: Vec::new(),
            blocks: Vec::new(),
            edges: Vec::new(),
            locals: Vec::new(),
            locals_size: 0,
            cursor: InsertPoint {
                block: BlockId(0),
                before: None,
            },
        };
        let entry = ir.append_block();
        ir.cursor.block = entry;
        ir
    }

    /// A module with no blocks at all, used only by the parser: blocks are
    /// created to match the text's own `block N:` declarations instead of
    /// getting an implicit entry block.
    pub(crate) fn empty() -> Ir {
        Ir {
            values: Vec::new(),
            instrs: Vec::new(),
            blocks: Vec::new(),
            edges: Vec::new(),
            locals: Vec::new(),
            locals_size: 0,
            cursor: InsertPoint {
                block: BlockId(0),
                before: None,
            },
        }
    }

    // -- blocks --------------------------------------------------------

    pub fn append_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new());
        id
    }

    /// Insert a new block immediately after `after` and renumber labels.
    pub fn insert_block_after(&mut self, after: BlockId) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new());
        self.renumber_blocks_after(after, id);
        id
    }

    fn renumber_blocks_after(&mut self, _after: BlockId, _new: BlockId) {
        self.renumber_labels();
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(i as u32), b))
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Remove a block's incoming/outgoing edges and drop it from the block
    /// list's logical view. The arena slot is tombstoned, not reused: other
    /// `BlockId`s remain valid.
    pub fn remove_block(&mut self, id: BlockId) {
        let succs = self.blocks[id.index()].succs.clone();
        let preds = self.blocks[id.index()].preds.clone();
        for s in succs {
            self.blocks[s.index()].preds.retain(|&p| p != id);
        }
        for p in preds {
            self.blocks[p.index()].succs.retain(|&s| s != id);
        }
        self.edges.retain(|e| e.src != id && e.dst != id);
        self.blocks[id.index()].instrs.clear();
        self.blocks[id.index()].succs.clear();
        self.blocks[id.index()].preds.clear();
    }

    pub fn add_edge(&mut self, src: BlockId, dst: BlockId) {
        if self.edges.contains(&Edge { src, dst }) {
            return;
        }
        self.edges.push(Edge { src, dst });
        self.blocks[src.index()].succs.push(dst);
        self.blocks[dst.index()].preds.push(src);
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Clear all CFA-derived edges, e.g. before re-running control-flow
    /// analysis on a mutated module.
    pub fn clear_edges(&mut self) {
        self.edges.clear();
        for b in &mut self.blocks {
            b.succs.clear();
            b.preds.clear();
        }
    }

    // -- instructions ----------------------------------------------------

    pub fn instr(&self, id: InstrId) -> &Instruction {
        &self.instrs[id.index()]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instruction {
        &mut self.instrs[id.index()]
    }

    pub fn instr_count(&self) -> usize {
        self.instrs.len()
    }

    /// Remove an instruction from its block's instruction list. Does not
    /// touch the use lists of its arguments or result; callers that remove a
    /// live instruction must first clear its result's uses (see DCE).
    pub fn remove_instr(&mut self, id: InstrId) {
        let block = self.instrs[id.index()].block;
        self.blocks[block.index()].instrs.retain(|&i| i != id);
    }

    pub fn renumber_labels(&mut self) {
        for (i, b) in self.blocks.iter_mut().enumerate() {
            b.label = i as u32;
        }
        for b in 0..self.blocks.len() {
            let instrs = self.blocks[b].instrs.clone();
            for (i, instr_id) in instrs.iter().enumerate() {
                self.instrs[instr_id.index()].label = i as u32;
            }
        }
    }

    // -- values ------------------------------------------------------------

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn alloc_const(&mut self, c: Constant) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value::new_const(c));
        id
    }

    pub(crate) fn alloc_def(&mut self, ty: ValueType, instr: InstrId) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value::new_def(ty, instr));
        id
    }

    pub(crate) fn push_use(&mut self, value: ValueId, u: Use) {
        self.values[value.index()].uses.push(u);
    }

    pub(crate) fn remove_use(&mut self, value: ValueId, u: Use) {
        self.values[value.index()].uses.retain(|&x| x != u);
    }

    /// Rewrite a single argument slot of `instr` from whatever it currently
    /// holds to `new`, maintaining both values' use lists.
    pub fn replace_use(&mut self, instr: InstrId, slot: u8, new: ValueId) {
        let old = self.instrs[instr.index()].args[slot as usize];
        if let Some(old) = old {
            if old == new {
                return;
            }
            self.remove_use(old, Use { instr, slot });
        }
        self.instrs[instr.index()].args[slot as usize] = Some(new);
        self.push_use(new, Use { instr, slot });
    }

    /// Rewrite every recorded use of `old` to point at `new`. O(|uses of
    /// old|): walks `old`'s use list exactly once rather than scanning every
    /// instruction in the module.
    pub fn replace_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let uses = std::mem::take(&mut self.values[old.index()].uses);
        for u in &uses {
            self.instrs[u.instr.index()].args[u.slot as usize] = Some(new);
            self.push_use(new, *u);
        }
    }

    /// Append an instruction directly to `instr.block`'s instruction list,
    /// wiring argument use-lists and allocating a result value if
    /// `result_ty` is given. Used by the parser, which already knows the
    /// target block and doesn't go through the insertion cursor.
    pub(crate) fn push_parsed_instr(
        &mut self,
        mut instr: Instruction,
        args: &[ValueId],
        result_ty: Option<ValueType>,
    ) -> (InstrId, Option<ValueId>) {
        let block = instr.block;
        for (i, a) in args.iter().enumerate() {
            instr.args[i] = Some(*a);
        }
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(instr);
        for (slot, a) in args.iter().enumerate() {
            self.push_use(*a, Use {
                instr: id,
                slot: slot as u8,
            });
        }
        self.blocks[block.index()].instrs.push(id);

        let result = result_ty.map(|ty| {
            let v = self.alloc_def(ty, id);
            self.instrs[id.index()].result = Some(v);
            v
        });
        (id, result)
    }

    // -- locals --------------------------------------------------------

    pub(crate) fn push_parsed_local(&mut self, ty: ValueType, offset: u32) {
        self.locals.push(Local { ty, offset });
    }

    pub(crate) fn recompute_locals_size(&mut self, footprint: impl Fn(ValueType) -> u32) {
        self.locals_size = self
            .locals
            .iter()
            .map(|l| l.offset + footprint(l.ty))
            .max()
            .unwrap_or(0);
    }

    pub fn alloc_local(&mut self, ty: ValueType) -> u32 {
        let offset = self.locals_size;
        self.locals_size += ty.size_bytes().max(8);
        self.locals.push(Local { ty, offset });
        offset
    }

    /// Reuse an existing local slot of a compatible size rather than growing
    /// the frame, mirroring the original backend's local-slot recycling for
    /// short-lived spills.
    pub fn reuse_local(&mut self, offset: u32, ty: ValueType) -> u32 {
        if let Some(local) = self.locals.iter_mut().find(|l| l.offset == offset) {
            local.ty = ty;
            return offset;
        }
        self.alloc_local(ty)
    }

    pub fn locals(&self) -> &[Local] {
        &self.locals
    }

    pub fn locals_size(&self) -> u32 {
        self.locals_size
    }

    /// Map from guest block-label constant to `BlockId`, used by the parser
    /// to resolve forward-referenced branch targets.
    pub(crate) fn label_index(&self) -> FxHashMap<u32, BlockId> {
        self.blocks().map(|(id, b)| (b.label, id)).collect()
    }
}

impl Default for Ir {
    fn default() -> Ir {
        Ir::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueType;

    #[test]
    fn replace_uses_fixes_up_every_argument_slot() {
        let mut ir = Ir::new();
        let old = ir.alloc_i32(1);
        let a = ir.add(ValueType::I32, old, old);
        let b = ir.neg(ValueType::I32, old);
        ir.store(a, b);

        let new = ir.alloc_i32(2);
        ir.replace_uses(old, new);

        for u in ir.value(new).uses() {
            let slot_value = ir.instr(u.instr).args[u.slot as usize];
            assert_eq!(slot_value, Some(new));
        }
        assert!(ir.value(old).uses().is_empty());
    }

    #[test]
    fn block_edges_are_symmetric() {
        let mut ir = Ir::new();
        let entry = ir.cursor.block;
        let next = ir.append_block();
        ir.add_edge(entry, next);

        assert!(ir.block(entry).succs().contains(&next));
        assert!(ir.block(next).preds().contains(&entry));
    }
}
