//! Block metadata, compiled code, and the patchable edges between them.
//!
//! Grounded on `jit_block_meta`/`jit_compile_unit`/`jit_edge`/`jit_code`:
//! the original keeps meta (static facts the front end's analysis pass
//! produced) separate from code (the result of actually compiling it), so
//! an invalidated compile can drop the code while keeping the meta that
//! let the engine skip re-analyzing the guest bytes next time.

use crate::ir::{BlockId, Ir, ValueId};

/// How a basic block exits, mirroring the front end's branch
/// classification (see `sh4_frontend_analyze_code`'s BF/BFS/BT/BTS/BRA/...
/// dispatch): static targets are known at analysis time, dynamic ones only
/// at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchType {
    FallThrough,
    Static,
    StaticTrue,
    StaticFalse,
    Dynamic,
    DynamicTrue,
    DynamicFalse,
}

impl BranchType {
    pub fn is_static(self) -> bool {
        matches!(
            self,
            BranchType::Static | BranchType::StaticTrue | BranchType::StaticFalse
        )
    }

    pub fn is_conditional(self) -> bool {
        matches!(
            self,
            BranchType::StaticTrue
                | BranchType::StaticFalse
                | BranchType::DynamicTrue
                | BranchType::DynamicFalse
        )
    }
}

/// Index of a [`CompileUnit`] within the `units` arena of the [`Code`] that
/// owns it. Not meaningful across two different `Code`s' arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompileUnitId(pub u32);

impl CompileUnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Records that some compile unit currently shares a [`BlockMeta`], so the
/// meta can't be freed out from under a live `Code` still referencing it.
/// Mirrors `jit_block_meta::compile_refs`, a list of the `jit_compile_unit`s
/// pointing back at this meta.
#[derive(Debug, Clone, Copy)]
pub struct CompileRef {
    pub code_guest_addr: u32,
    pub unit: CompileUnitId,
}

/// Static facts about one guest basic block, produced by a front end's
/// analysis pass and valid independent of whether it's currently compiled.
///
/// Meta is unique per `guest_addr`: once created and successfully analyzed
/// it is immutable until freed, and may be shared by more than one `Code`'s
/// compile-unit tree (`compile_refs` tracks who).
#[derive(Debug, Clone)]
pub struct BlockMeta {
    pub guest_addr: u32,
    pub guest_size: u32,
    pub num_instrs: u32,
    pub num_cycles: u32,
    pub branch_type: BranchType,
    /// Guest address of the (possibly conditional) branch target, when
    /// `branch_type` is static.
    pub branch_addr: Option<u32>,
    /// Guest address execution falls through to when the branch isn't
    /// taken, or after a `FallThrough` block.
    pub next_addr: Option<u32>,
    /// Every compile unit, across every `Code` currently in the cache, that
    /// references this meta.
    pub compile_refs: Vec<CompileRef>,
    /// Stamped with the engine's `visit_token` while a single compile's
    /// tree-building recursion is walking the graph, so a block reachable
    /// from itself (a loop) terminates the tree instead of re-expanding.
    pub visited: u64,
}

impl BlockMeta {
    /// A fresh meta with no compile refs and no visit stamp, as produced by
    /// a front end's `analyze_code`. `compile_refs`/`visited` are bookkeeping
    /// the engine owns, not the front end.
    pub fn from_analysis(
        guest_addr: u32,
        guest_size: u32,
        num_instrs: u32,
        num_cycles: u32,
        branch_type: BranchType,
        branch_addr: Option<u32>,
        next_addr: Option<u32>,
    ) -> BlockMeta {
        BlockMeta {
            guest_addr,
            guest_size,
            num_instrs,
            num_cycles,
            branch_type,
            branch_addr,
            next_addr,
            compile_refs: Vec::new(),
            visited: 0,
        }
    }
}

/// A patchable direct jump from one compiled block into another.
///
/// Distinct from [`crate::ir::Edge`], which connects IR blocks within a
/// single compile unit; a `CodeEdge` connects two independently compiled
/// and cached regions of host code.
#[derive(Debug, Clone, Copy)]
pub struct CodeEdge {
    /// Host address of the branch instruction being patched.
    pub branch_host_addr: u64,
    /// Guest address the branch targets once resolved.
    pub target_guest_addr: u32,
    /// `true` once `patch_edge` has rewritten the branch to jump directly
    /// at the target's compiled code, instead of through the dispatcher.
    pub patched: bool,
}

/// One node of a `Code`'s compile-unit tree: the classification snapshot
/// the engine's tree-building recursion copied out of a (possibly shared)
/// [`BlockMeta`], plus the tree edges to its children.
///
/// Grounded on `jit_compile_unit`: `parent` is just `parent_guest_addr`
/// here (the root `Code` owns the whole arena, so there's no need for a
/// pointer back to it); `branch`/`next` are `Some` when that exit stays
/// inside this tree (a direct IR branch to a sibling unit's block) and
/// `None` when it instead exits via a thunk to `branch_addr`/`next_addr`.
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub guest_addr: u32,
    pub guest_size: u32,
    pub num_instrs: u32,
    pub num_cycles: u32,
    pub branch_type: BranchType,
    pub branch_addr: Option<u32>,
    pub next_addr: Option<u32>,
    pub parent_guest_addr: u32,
    /// Child unit reached when the (possibly conditional) branch is taken,
    /// if that target lies within this same tree.
    pub branch: Option<CompileUnitId>,
    /// Child unit reached on fall-through / when the branch isn't taken, if
    /// that target lies within this same tree.
    pub next: Option<CompileUnitId>,
    /// The condition value lowered for a conditional exit, once translated.
    pub branch_cond: Option<ValueId>,
    /// The runtime-computed target value lowered for a dynamic exit, once
    /// translated.
    pub branch_dest: Option<ValueId>,
    /// This unit's IR block, once translated.
    pub block: BlockId,
}

impl CompileUnit {
    /// A tree node with its structural fields not yet resolved: `block` is
    /// a placeholder until `translate_code` allocates the real one.
    pub fn from_meta(meta: &BlockMeta, parent_guest_addr: u32) -> CompileUnit {
        CompileUnit {
            guest_addr: meta.guest_addr,
            guest_size: meta.guest_size,
            num_instrs: meta.num_instrs,
            num_cycles: meta.num_cycles,
            branch_type: meta.branch_type,
            branch_addr: meta.branch_addr,
            next_addr: meta.next_addr,
            parent_guest_addr,
            branch: None,
            next: None,
            branch_cond: None,
            branch_dest: None,
            block: BlockId(0),
        }
    }
}

/// The IR and tree-exit bookkeeping a `Frontend::translate_code` call hands
/// back to the engine: the exits list is in the same order as the backend's
/// `branch_offsets`, so the engine can zip them into `CodeEdge`s.
#[derive(Debug, Clone)]
pub struct Translation {
    pub ir: Ir,
    /// Block execution starts at.
    pub entry: BlockId,
    /// Guest addresses of every tree-exit thunk, in emission order.
    pub exits: Vec<u32>,
}

/// One compiled block of host code.
///
/// `bytes` is kept alongside `host_addr`/`host_size` rather than handed off
/// to an executable mapping, since mapping assembled code executable is the
/// host embedder's job, not this crate's (see `backend` module docs).
/// `host_addr` is simply `bytes.as_ptr() as u64` and stays valid for as
/// long as `bytes` itself isn't reallocated.
#[derive(Debug, Clone, Default)]
pub struct Code {
    pub guest_addr: u32,
    pub host_addr: u64,
    pub host_size: u64,
    pub bytes: Vec<u8>,
    pub edges: Vec<CodeEdge>,
    /// Whether this block's memory ops still use the direct fastmem path.
    /// Cleared by the engine's fastmem fault recovery (`JitEngine::
    /// handle_exception`) when a host fault is attributed to one of this
    /// block's `LoadFast`/`StoreFast` instructions; the block is then
    /// invalidated so the next dispatch recompiles through the slow path.
    pub fastmem: bool,
    /// The compile-unit tree this code was translated from, flattened into
    /// an arena. Kept after compilation so invalidation can walk it back to
    /// every `BlockMeta` it references and drop this code's `CompileRef`.
    pub units: Vec<CompileUnit>,
    pub root_unit: Option<CompileUnitId>,
}

impl Code {
    pub fn contains_host_addr(&self, addr: u64) -> bool {
        addr >= self.host_addr && addr < self.host_addr + self.host_size
    }

    pub fn root(&self) -> Option<&CompileUnit> {
        self.root_unit.map(|id| &self.units[id.index()])
    }
}
