//! SH-4 and ARMv3 basic-block analyzers and translators.

mod armv3;
mod sh4;

pub use armv3::ArmV3Frontend;
pub use sh4::Sh4Frontend;

use crate::cache::{BlockMeta, BranchType, CompileUnit, CompileUnitId, Translation};
use crate::dispatch::GuestMemory;
use crate::error::AnalyzeError;
use crate::ir::{Ir, ValueId};

/// A guest instruction-set front end: turns a run of guest bytes starting
/// at one address into block metadata (`analyze_code`), and a whole
/// compile-unit tree (built by the engine's own recursive analysis, one
/// `analyze_code` call per node) into IR (`translate_code`).
///
/// Kept as two steps, matching the original's own `jit_frontend` split:
/// `analyze_code` operates on a single `jit_block_meta` and knows nothing
/// about the tree it will end up part of, while `translate_code` walks the
/// whole `jit_code`'s tree to emit IR with direct branches between sibling
/// units, falling back to a dispatch thunk only at true tree exits.
pub trait Frontend {
    fn analyze_code(
        &self,
        guest: &dyn GuestMemory,
        guest_addr: u32,
    ) -> Result<BlockMeta, AnalyzeError>;

    fn translate_code(
        &self,
        guest: &dyn GuestMemory,
        units: &mut [CompileUnit],
        root: CompileUnitId,
    ) -> Result<Translation, AnalyzeError>;

    /// Disassemble `[start_addr, end_addr)` into a human-readable listing,
    /// one line per guest instruction (plus its delay slot, if any).
    fn dump_code(&self, guest: &dyn GuestMemory, start_addr: u32, end_addr: u32) -> String;
}

/// Guards against a runaway analysis loop on corrupt or self-modifying
/// guest code that never hits a block-terminating instruction.
pub(crate) const MAX_BLOCK_INSTRS: u32 = 1024;

/// Allocate one IR block per unit in the tree, reusing `Ir::new`'s implicit
/// entry block for `root` so translation can start emitting there directly.
/// Shared by both front ends: this part of `translate_code` has no
/// architecture-specific content, only the generic tree shape.
pub(crate) fn alloc_tree_blocks(ir: &mut Ir, units: &mut [CompileUnit], root: CompileUnitId) {
    let (entry_block, _) = ir.blocks().next().expect("Ir::new always has an entry block");
    let mut blocks = Vec::with_capacity(units.len());
    for i in 0..units.len() {
        let id = CompileUnitId(i as u32);
        let block = if id.0 == root.0 { entry_block } else { ir.append_block() };
        blocks.push(block);
    }
    for (i, unit) in units.iter_mut().enumerate() {
        unit.block = blocks[i];
    }
}

/// Emit the IR terminator for unit `i`, per the branch-classification
/// table: a direct IR branch into a sibling unit's block when that exit
/// stays within this tree, otherwise a dispatch thunk to the exit's guest
/// address. Thunked exits are pushed onto `exits` in emission order, so the
/// engine can zip them against the assembled code's `branch_offsets` to
/// build real `CodeEdge`s. Generic across front ends: nothing here is
/// architecture-specific, only the tree shape `analyze_code_r` built.
pub(crate) fn emit_terminator(ir: &mut Ir, units: &mut [CompileUnit], i: usize, exits: &mut Vec<u32>) {
    let branch_type = units[i].branch_type;
    let branch = units[i].branch;
    let next = units[i].next;
    let branch_addr = units[i].branch_addr;
    let next_addr = units[i].next_addr;

    match branch_type {
        BranchType::Static => {
            emit_exit(ir, units, branch, branch_addr, exits);
        }
        BranchType::FallThrough => {
            emit_exit(ir, units, next, next_addr, exits);
        }
        BranchType::StaticTrue | BranchType::StaticFalse => {
            let cond = ir.alloc_i8(1);
            units[i].branch_cond = Some(cond);
            emit_cond_exit(ir, units, cond, branch, branch_addr, exits);
            emit_exit(ir, units, next, next_addr, exits);
        }
        BranchType::Dynamic => {
            let dest = ir.alloc_ptr(0);
            units[i].branch_dest = Some(dest);
            ir.call_noreturn(dest, None, None);
        }
        BranchType::DynamicTrue | BranchType::DynamicFalse => {
            let cond = ir.alloc_i8(1);
            let dest = ir.alloc_ptr(0);
            units[i].branch_cond = Some(cond);
            units[i].branch_dest = Some(dest);
            ir.call_cond(cond, dest, None, None);
            emit_exit(ir, units, next, next_addr, exits);
        }
    }
}

/// An unconditional exit: branch straight into `child`'s block if the
/// target stayed in this tree, else thunk to `addr` and record it in
/// `exits`.
fn emit_exit(
    ir: &mut Ir,
    units: &[CompileUnit],
    child: Option<CompileUnitId>,
    addr: Option<u32>,
    exits: &mut Vec<u32>,
) {
    match child {
        Some(id) => {
            let target = ir.alloc_block_ref(units[id.index()].block);
            ir.branch(target);
        }
        None => {
            if let Some(addr) = addr {
                let t = ir.alloc_ptr(addr as u64);
                ir.call_noreturn(t, None, None);
                exits.push(addr);
            }
        }
    }
}

/// A conditional exit, taken when `cond` holds: branch into `child`'s block
/// if the target stayed in this tree, else thunk to `addr` and record it.
fn emit_cond_exit(
    ir: &mut Ir,
    units: &[CompileUnit],
    cond: ValueId,
    child: Option<CompileUnitId>,
    addr: Option<u32>,
    exits: &mut Vec<u32>,
) {
    match child {
        Some(id) => {
            let target = ir.alloc_block_ref(units[id.index()].block);
            ir.branch_true(cond, target);
        }
        None => {
            if let Some(addr) = addr {
                let t = ir.alloc_ptr(addr as u64);
                ir.call_cond(cond, t, None, None);
                exits.push(addr);
            }
        }
    }
}
