//! Cross-module scenarios spanning the engine, cache, and front-end seam:
//! lazy and eager edge patching between independently compiled blocks,
//! invalidation's interaction with reverse lookup, and recovery from a
//! failed assemble.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use dcjit_core::backend::{AssembleError, AssembledCode};
use dcjit_core::cache::{BlockMeta, BranchType, CompileUnit, CompileUnitId, Translation};
use dcjit_core::ir::Ir;
use dcjit_core::{DispatchTable, Frontend, GuestMemory, HostBackend, JitConfig, JitEngine};

struct NullMemory;

impl GuestMemory for NullMemory {
    fn r8(&self, _addr: u32) -> u8 {
        0
    }
    fn r16(&self, _addr: u32) -> u16 {
        0
    }
    fn r32(&self, _addr: u32) -> u32 {
        0
    }
    fn r64(&self, _addr: u32) -> u64 {
        0
    }
    fn w8(&mut self, _addr: u32, _v: u8) {}
    fn w16(&mut self, _addr: u32, _v: u16) {}
    fn w32(&mut self, _addr: u32, _v: u32) {}
    fn w64(&mut self, _addr: u32, _v: u64) {}
}

/// A small fixed control-flow graph, just enough shape to exercise
/// tree-building and edge patching without needing real SH-4/ARMv3 decode:
///
/// - `0x0` statically branches to `0x50`.
/// - `0x50` statically branches to `0x60`.
/// - `0x60` statically branches back to `0x50` — a loop, which
///   tree-building suppresses as a revisit, turning it into a dispatch
///   thunk whose target is the known guest address `0x50`.
/// - every other address is a `Dynamic` leaf with no outgoing edges.
///
/// Compiling `0x50` alone therefore produces a self-referencing thunk
/// (`0x50`'s own tree loops back to itself); compiling `0x0` first and then
/// `0x50` produces a genuine cross-`Code` thunk, since `0x0`'s tree reaches
/// the loop back to `0x50` before `0x50` has been compiled as its own root.
struct BranchingFrontend;

impl Frontend for BranchingFrontend {
    fn analyze_code(&self, _guest: &dyn GuestMemory, guest_addr: u32) -> Result<BlockMeta, dcjit_core::AnalyzeError> {
        let (branch_type, branch_addr) = match guest_addr {
            0x0 => (BranchType::Static, Some(0x50)),
            0x50 => (BranchType::Static, Some(0x60)),
            0x60 => (BranchType::Static, Some(0x50)),
            _ => (BranchType::Dynamic, None),
        };
        Ok(BlockMeta::from_analysis(guest_addr, 2, 1, 1, branch_type, branch_addr, None))
    }

    fn translate_code(
        &self,
        _guest: &dyn GuestMemory,
        units: &mut [CompileUnit],
        root: CompileUnitId,
    ) -> Result<Translation, dcjit_core::AnalyzeError> {
        let mut ir = Ir::new();
        let (entry_block, _) = ir.blocks().next().expect("Ir::new always has an entry block");
        for (i, unit) in units.iter_mut().enumerate() {
            unit.block = if CompileUnitId(i as u32) == root {
                entry_block
            } else {
                ir.append_block()
            };
        }

        let mut exits = Vec::new();
        for i in 0..units.len() {
            ir.set_insert_point_end(units[i].block);
            match units[i].branch_type {
                BranchType::Static => match units[i].branch {
                    Some(child) => {
                        let target = ir.alloc_block_ref(units[child.index()].block);
                        ir.branch(target);
                    }
                    None => {
                        if let Some(addr) = units[i].branch_addr {
                            let t = ir.alloc_ptr(addr as u64);
                            ir.call_noreturn(t, None, None);
                            exits.push(addr);
                        }
                    }
                },
                BranchType::Dynamic => {
                    let dest = ir.alloc_ptr(0);
                    ir.call_noreturn(dest, None, None);
                }
                _ => {}
            }
        }

        Ok(Translation { ir, entry: entry_block, exits })
    }

    fn dump_code(&self, _guest: &dyn GuestMemory, _start_addr: u32, _end_addr: u32) -> String {
        String::new()
    }
}

/// Hands back a fresh small code buffer every call, unless `fail` is set, in
/// which case it reports an assemble failure (modeling a backend buffer
/// that's run out of room). Always reports its sole branch instruction at
/// byte offset 0, so the engine's exit-zipping has something to patch.
struct FlakyBackend {
    fail: Rc<Cell<bool>>,
}

impl HostBackend for FlakyBackend {
    fn reset(&mut self) {}

    fn assemble_code(&mut self, _ir: &Ir) -> Result<AssembledCode, AssembleError> {
        if self.fail.get() {
            Err(AssembleError::NoBackend)
        } else {
            Ok(AssembledCode {
                bytes: vec![0u8; 16],
                branch_offsets: vec![0],
            })
        }
    }

    fn dump_code(&self, _bytes: &[u8]) -> String {
        String::new()
    }

    fn handle_exception(&self, _fault_host_addr: u64) -> bool {
        false
    }
}

#[derive(Default)]
struct RecordingDispatch {
    cached: HashMap<u32, u64>,
    patched_edges: Vec<(u64, u64)>,
    invalidated: Vec<u32>,
}

impl DispatchTable for RecordingDispatch {
    fn lookup_code(&self, guest_addr: u32) -> Option<u64> {
        self.cached.get(&guest_addr).copied()
    }
    fn cache_code(&mut self, guest_addr: u32, host_addr: u64) {
        self.cached.insert(guest_addr, host_addr);
    }
    fn invalidate_code(&mut self, guest_addr: u32) {
        self.invalidated.push(guest_addr);
        self.cached.remove(&guest_addr);
    }
    fn patch_edge(&mut self, branch_host_addr: u64, target_host_addr: u64) {
        self.patched_edges.push((branch_host_addr, target_host_addr));
    }
    fn restore_edge(&mut self, _branch_host_addr: u64) {}
}

fn working_backend() -> FlakyBackend {
    FlakyBackend {
        fail: Rc::new(Cell::new(false)),
    }
}

/// S3: compiling `0x0` first leaves its loop-back-to-`0x50` thunk unpatched
/// (since `0x50` isn't compiled yet); compiling `0x50` afterward must patch
/// it automatically as `0x50`'s own compile finishes, without either side
/// calling `add_edge` itself — this is the compile-time half of edge
/// patching.
#[test]
fn incoming_edge_from_earlier_compile_is_patched_eagerly() {
    let mut engine = JitEngine::new(JitConfig::default(), BranchingFrontend, working_backend());
    let mut dispatch = RecordingDispatch::default();
    let guest = NullMemory;

    let a_host = engine.compile_code(&guest, &mut dispatch, 0x0).unwrap();
    let b_host = engine.compile_code(&guest, &mut dispatch, 0x50).unwrap();

    assert_eq!(dispatch.patched_edges, vec![(a_host, b_host)]);
}

/// The run-time half of edge patching: a self-referencing thunk (`0x50`'s
/// own loop, which closes back on its own root) isn't patched automatically
/// at compile time — only `add_edge`, called the way a dispatch-miss thunk
/// would call it the first time the branch is actually taken, links it.
#[test]
fn add_edge_links_self_referencing_thunk_lazily() {
    let mut engine = JitEngine::new(JitConfig::default(), BranchingFrontend, working_backend());
    let mut dispatch = RecordingDispatch::default();
    let guest = NullMemory;

    let host = engine.compile_code(&guest, &mut dispatch, 0x50).unwrap();
    assert!(dispatch.patched_edges.is_empty());

    engine.add_edge(&mut dispatch, host, 0x50);

    assert_eq!(dispatch.patched_edges, vec![(host, host)]);
}

/// `add_edge` must no-op once the calling code has gone stale (the guest
/// dispatcher's own pointer for it no longer matches what this engine has
/// cached), rather than patching a branch that's about to be discarded.
#[test]
fn add_edge_from_stale_source_is_ignored() {
    let mut engine = JitEngine::new(JitConfig::default(), BranchingFrontend, working_backend());
    let mut dispatch = RecordingDispatch::default();
    let guest = NullMemory;

    let host = engine.compile_code(&guest, &mut dispatch, 0x50).unwrap();
    engine.invalidate_code(&mut dispatch, 0x50);

    engine.add_edge(&mut dispatch, host, 0x50);

    assert!(dispatch.patched_edges.is_empty());
}

/// `add_edge` must no-op when the destination hasn't been compiled yet; the
/// branch keeps going through the dispatcher until a later call succeeds.
#[test]
fn add_edge_to_uncompiled_target_is_ignored() {
    let mut engine = JitEngine::new(JitConfig::default(), BranchingFrontend, working_backend());
    let mut dispatch = RecordingDispatch::default();
    let guest = NullMemory;

    let host = engine.compile_code(&guest, &mut dispatch, 0x0).unwrap();

    engine.add_edge(&mut dispatch, host, 0x90);

    assert!(dispatch.patched_edges.is_empty());
}

/// S4: after invalidating a live block, it stays reverse-lookupable (so a
/// fault landing inside its now-stale code can still be attributed to it)
/// but a forward lookup by guest address misses.
#[test]
fn invalidation_preserves_reverse_lookup() {
    let mut engine = JitEngine::new(JitConfig::default(), BranchingFrontend, working_backend());
    let mut dispatch = RecordingDispatch::default();
    let guest = NullMemory;

    let host_addr = engine.compile_code(&guest, &mut dispatch, 0x20).unwrap();
    assert_eq!(engine.reverse_lookup(host_addr).unwrap(), 0x20);

    engine.invalidate_code(&mut dispatch, 0x20);

    assert!(engine.lookup_code(0x20).is_none());
    assert_eq!(engine.reverse_lookup(host_addr).unwrap(), 0x20);
}

/// S5: a failed assemble must flush the *entire* code cache, not just
/// decline to cache the block that failed — an already-compiled, unrelated
/// block must be gone too. Once the backend recovers, both addresses
/// compile cleanly again.
#[test]
fn failed_assemble_flushes_the_whole_cache() {
    let fail = Rc::new(Cell::new(false));
    let backend = FlakyBackend { fail: fail.clone() };
    let mut engine = JitEngine::new(JitConfig::default(), BranchingFrontend, backend);
    let mut dispatch = RecordingDispatch::default();
    let guest = NullMemory;

    engine.compile_code(&guest, &mut dispatch, 0x40).unwrap();
    assert_eq!(engine.code_cache_len(), 1);
    assert_eq!(engine.code_reverse_len(), 1);

    fail.set(true);
    let err = engine.compile_code(&guest, &mut dispatch, 0x30);
    assert!(err.is_err());
    assert!(engine.lookup_code(0x30).is_none());
    assert!(engine.lookup_code(0x40).is_none());
    assert_eq!(engine.code_cache_len(), 0);
    assert_eq!(engine.code_reverse_len(), 0);

    fail.set(false);
    let host_addr = engine.compile_code(&guest, &mut dispatch, 0x30).unwrap();
    assert!(engine.lookup_code(0x30).is_some());
    assert_eq!(engine.reverse_lookup(host_addr).unwrap(), 0x30);
}
