//! The JIT engine: owns the meta/code caches and drives compile, edge
//! patching, and invalidation.
//!
//! Grounded on the `jit` struct's own `meta`/`code`/`code_reverse` trees
//! plus its `visit_token` counter. The original keys both trees with a
//! red-black tree for predecessor queries; `code_reverse` here is a
//! `BTreeMap<u64, u32>` queried with `range(..=host_addr).next_back()`,
//! the straightforward Rust equivalent of that `rb_prev` walk — a hash map
//! can't answer "which region contains this address" at all.
//!
//! Compiling one guest address builds a whole *compile-unit tree* rooted at
//! it (`build_compile_tree`/`analyze_code_r`, grounded on `jit_analyze_code_r`):
//! every statically reachable child block gets pulled into the same `Code`
//! and translated as a direct IR branch, not a separate cache entry, so one
//! dispatch hit can run straight through several guest basic blocks without
//! returning to the dispatcher. A tree only *exits* through a thunk at a
//! dynamic branch, an unanalyzable target, or a revisited block (cycle
//! suppression via `BlockMeta::visited`). Those thunks are where cross-`Code`
//! linking happens, and it happens two ways: eagerly, when the target is
//! already compiled at the moment this code finishes compiling
//! (`patch_incoming_edges`); and lazily, when the target compiles later and
//! the dispatch-miss thunk itself calls back into `add_edge` the first time
//! it's actually taken (grounded on `jit_add_edge`, invoked from generated
//! dispatch-miss code, not from the compiler).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::backend::HostBackend;
use crate::cache::{BlockMeta, Code, CodeEdge, CompileUnit, CompileUnitId};
use crate::dispatch::{DispatchTable, GuestMemory};
use crate::error::{CacheError, JitError};
use crate::frontend::Frontend;
use crate::pass;

/// 16 MiB, matching the original's fixed `ir_buffer` allocation — the cap
/// on how much IR a single engine instance will build across its lifetime
/// before compilation starts failing with [`CacheError::IrBufferExhausted`].
const DEFAULT_IR_BUFFER_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct JitConfig {
    pub ir_buffer_limit: usize,
    pub pass_order: Vec<String>,
    pub enable_dumps: bool,
    pub enable_perf_map: bool,
}

impl Default for JitConfig {
    fn default() -> JitConfig {
        JitConfig {
            ir_buffer_limit: DEFAULT_IR_BUFFER_LIMIT,
            pass_order: pass::DEFAULT_ORDER.iter().map(|s| s.to_string()).collect(),
            enable_dumps: false,
            enable_perf_map: false,
        }
    }
}

#[derive(Debug, Default)]
struct CodeEntry {
    code: Code,
    /// Set by `invalidate_code`. The entry stays in both `code` and
    /// `code_reverse` so reverse lookups keep resolving host addresses
    /// inside it (Testable Property 9 / S4), but forward `lookup_code`
    /// treats it as a miss. Cleared only by `flush_code_retain_meta` /
    /// `free_cache`, or by being overwritten on recompile.
    invalidated: bool,
}

impl std::ops::Deref for CodeEntry {
    type Target = Code;
    fn deref(&self) -> &Code {
        &self.code
    }
}

impl std::ops::DerefMut for CodeEntry {
    fn deref_mut(&mut self) -> &mut Code {
        &mut self.code
    }
}

pub struct JitEngine<F, B> {
    config: JitConfig,
    frontend: F,
    backend: B,
    meta: RwLock<BTreeMap<u32, BlockMeta>>,
    code: RwLock<BTreeMap<u32, CodeEntry>>,
    code_reverse: RwLock<BTreeMap<u64, u32>>,
    visit_token: AtomicU64,
    ir_bytes_used: AtomicUsize,
}

impl<F: Frontend, B: HostBackend> JitEngine<F, B> {
    pub fn new(config: JitConfig, frontend: F, backend: B) -> JitEngine<F, B> {
        JitEngine {
            config,
            frontend,
            backend,
            meta: RwLock::new(BTreeMap::new()),
            code: RwLock::new(BTreeMap::new()),
            code_reverse: RwLock::new(BTreeMap::new()),
            visit_token: AtomicU64::new(0),
            ir_bytes_used: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// Host entry point already cached for `guest_addr`, if any. An
    /// invalidated entry is still held for reverse lookups but counts as a
    /// miss here.
    pub fn lookup_code(&self, guest_addr: u32) -> Option<u64> {
        self.code
            .read()
            .get(&guest_addr)
            .filter(|e| !e.invalidated)
            .map(|e| e.host_addr)
    }

    /// The guest address whose compiled region contains `host_addr`, found
    /// by taking the last cached region starting at or before `host_addr`
    /// and checking it actually extends far enough to cover it.
    pub fn reverse_lookup(&self, host_addr: u64) -> Result<u32, CacheError> {
        let reverse = self.code_reverse.read();
        let (_, &guest_addr) = reverse
            .range(..=host_addr)
            .next_back()
            .ok_or(CacheError::HostAddrNotFound { host_addr })?;
        drop(reverse);
        let code = self.code.read();
        let entry = code
            .get(&guest_addr)
            .ok_or(CacheError::HostAddrNotFound { host_addr })?;
        if entry.contains_host_addr(host_addr) {
            Ok(guest_addr)
        } else {
            Err(CacheError::HostAddrNotFound { host_addr })
        }
    }

    pub fn meta(&self, guest_addr: u32) -> Option<BlockMeta> {
        self.meta.read().get(&guest_addr).cloned()
    }

    /// Number of guest addresses currently holding a (possibly invalidated)
    /// code entry. Introspection for cache-pressure diagnostics and tests.
    pub fn code_cache_len(&self) -> usize {
        self.code.read().len()
    }

    /// Number of host address ranges currently reverse-lookupable.
    pub fn code_reverse_len(&self) -> usize {
        self.code_reverse.read().len()
    }

    /// Analyze, translate, optimize, and assemble the compile-unit tree
    /// rooted at `guest_addr`, registering it in the cache and the host's
    /// dispatch table.
    ///
    /// Grounded on `jit_compile_code`: a recompile of an already-cached
    /// address always frees the existing code and rebuilds from scratch
    /// (inheriting only its `fastmem` flag), it never returns a stale cache
    /// hit directly — a caller that only wants the cached address without
    /// forcing a recompile should check `lookup_code` first.
    pub fn compile_code(
        &mut self,
        guest: &dyn GuestMemory,
        dispatch: &mut dyn DispatchTable,
        guest_addr: u32,
    ) -> Result<u64, JitError> {
        let inherited_fastmem = self.free_existing(dispatch, guest_addr);

        let (mut units, root) = self.build_compile_tree(guest, guest_addr)?;
        let translation = self.frontend.translate_code(guest, &mut units, root)?;

        let ir_bytes = translation.ir.instr_count() * std::mem::size_of::<crate::ir::Instruction>();
        let used = self.ir_bytes_used.fetch_add(ir_bytes, Ordering::Relaxed) + ir_bytes;
        if used > self.config.ir_buffer_limit {
            self.ir_bytes_used.fetch_sub(ir_bytes, Ordering::Relaxed);
            tracing::warn!(
                guest_addr = format_args!("0x{guest_addr:08x}"),
                used,
                limit = self.config.ir_buffer_limit,
                "ir buffer exhausted, flushing code cache"
            );
            self.flush_code_retain_meta(dispatch);
            return Err(CacheError::IrBufferExhausted {
                bytes_used: used,
                limit: self.config.ir_buffer_limit,
            }
            .into());
        }

        let mut ir = translation.ir;
        let pass_names: Vec<&str> = self.config.pass_order.iter().map(String::as_str).collect();
        pass::run_named(&mut ir, &pass_names);

        self.backend.reset();
        let assembled = match self.backend.assemble_code(&ir) {
            Ok(assembled) => assembled,
            Err(e) => {
                tracing::warn!(
                    guest_addr = format_args!("0x{guest_addr:08x}"),
                    error = %e,
                    "assemble failed, flushing code cache"
                );
                self.flush_code_retain_meta(dispatch);
                return Err(JitError::Assemble(e.to_string()));
            }
        };

        let host_addr = assembled.bytes.as_ptr() as u64;
        let host_size = assembled.bytes.len() as u64;

        let edges = translation
            .exits
            .iter()
            .zip(assembled.branch_offsets.iter())
            .map(|(&target_guest_addr, &offset)| CodeEdge {
                branch_host_addr: host_addr + offset as u64,
                target_guest_addr,
                patched: false,
            })
            .collect();

        {
            let mut meta = self.meta.write();
            for (i, unit) in units.iter().enumerate() {
                if let Some(m) = meta.get_mut(&unit.guest_addr) {
                    m.compile_refs.push(crate::cache::CompileRef {
                        code_guest_addr: guest_addr,
                        unit: CompileUnitId(i as u32),
                    });
                }
            }
        }

        self.code.write().insert(
            guest_addr,
            CodeEntry {
                code: Code {
                    guest_addr,
                    host_addr,
                    host_size,
                    bytes: assembled.bytes,
                    edges,
                    fastmem: inherited_fastmem.unwrap_or(true),
                    units,
                    root_unit: Some(root),
                },
                invalidated: false,
            },
        );
        self.code_reverse.write().insert(host_addr, guest_addr);
        dispatch.cache_code(guest_addr, host_addr);
        tracing::debug!(guest_addr = format_args!("0x{guest_addr:08x}"), host_addr, "compiled block");

        self.patch_incoming_edges(dispatch, guest_addr, host_addr);
        Ok(host_addr)
    }

    /// Build the compile-unit tree rooted at `guest_addr`, analyzing (and
    /// caching) `BlockMeta` for every node as the recursion reaches it.
    ///
    /// Grounded on `jit_analyze_code_r`'s driver: the root's analysis
    /// failure is fatal to the whole compile, but a failure analyzing a
    /// *child* just turns that exit into a dispatch thunk instead of an
    /// inlined branch (see `analyze_code_r`).
    fn build_compile_tree(
        &mut self,
        guest: &dyn GuestMemory,
        guest_addr: u32,
    ) -> Result<(Vec<CompileUnit>, CompileUnitId), JitError> {
        self.ensure_meta(guest, guest_addr)?;

        let token = self.visit_token.fetch_add(1, Ordering::Relaxed) + 1;
        let mut units = Vec::new();
        let root = self
            .analyze_code_r(guest, guest_addr, token, &mut units)
            .expect("root meta was just ensured to exist");
        Ok((units, root))
    }

    /// Analyze (if not already analyzed) and push a tree node for `addr`,
    /// recursing into its static successors. Returns `None` when `addr` is
    /// a cycle back to an already-visited node in this same tree, or when
    /// analysis fails — both cases leave the caller's exit as a dispatch
    /// thunk rather than an inlined branch.
    fn analyze_code_r(
        &mut self,
        guest: &dyn GuestMemory,
        addr: u32,
        token: u64,
        units: &mut Vec<CompileUnit>,
    ) -> Option<CompileUnitId> {
        self.analyze_code_r_child(guest, addr, addr, token, units)
    }

    fn analyze_code_r_child(
        &mut self,
        guest: &dyn GuestMemory,
        parent_addr: u32,
        addr: u32,
        token: u64,
        units: &mut Vec<CompileUnit>,
    ) -> Option<CompileUnitId> {
        {
            let meta = self.meta.read();
            if let Some(m) = meta.get(&addr) {
                if m.visited == token {
                    return None;
                }
            }
        }

        if self.ensure_meta(guest, addr).is_err() {
            tracing::debug!(
                addr = format_args!("0x{addr:08x}"),
                "child block failed analysis, leaving as dispatch thunk"
            );
            return None;
        }

        let (branch_addr, next_addr, meta_snapshot) = {
            let mut meta = self.meta.write();
            let m = meta.get_mut(&addr).expect("just ensured");
            m.visited = token;
            (m.branch_addr, m.next_addr, m.clone())
        };

        let id = CompileUnitId(units.len() as u32);
        units.push(CompileUnit::from_meta(&meta_snapshot, parent_addr));

        let branch = branch_addr.and_then(|a| self.analyze_code_r_child(guest, addr, a, token, units));
        let next = next_addr.and_then(|a| self.analyze_code_r_child(guest, addr, a, token, units));
        units[id.index()].branch = branch;
        units[id.index()].next = next;

        Some(id)
    }

    fn ensure_meta(&mut self, guest: &dyn GuestMemory, addr: u32) -> Result<(), JitError> {
        if self.meta.read().contains_key(&addr) {
            return Ok(());
        }
        let analyzed = self.frontend.analyze_code(guest, addr)?;
        self.meta.write().entry(addr).or_insert(analyzed);
        Ok(())
    }

    /// Free any code already compiled for `guest_addr`, returning its
    /// former `fastmem` flag so the recompile can inherit it. Grounded on
    /// `jit_compile_code`'s `if (existing) { fastmem = existing->fastmem;
    /// jit_free_code(jit, existing); }`.
    fn free_existing(&mut self, dispatch: &mut dyn DispatchTable, guest_addr: u32) -> Option<bool> {
        if !self.code.read().contains_key(&guest_addr) {
            return None;
        }
        self.invalidate_code_inner(dispatch, guest_addr);
        let entry = self.code.write().remove(&guest_addr)?;
        self.code_reverse.write().remove(&entry.code.host_addr);
        Some(entry.code.fastmem)
    }

    /// Recover from a host fault taken while executing compiled code, on the
    /// suspicion it came from a fastmem-path memory op. Reverse-looks-up the
    /// faulting address to the owning block; if the backend confirms the
    /// fault originated from that block's fastmem access, permanently
    /// disables fastmem for its guest address and invalidates it so the next
    /// dispatch recompiles through the slow (bounds-checked) path. Returns
    /// `false` if the fault isn't fastmem-related at all, in which case the
    /// caller has no recovery available and must treat it as fatal.
    pub fn handle_exception(&mut self, dispatch: &mut dyn DispatchTable, fault_host_addr: u64) -> bool {
        let Ok(guest_addr) = self.reverse_lookup(fault_host_addr) else {
            return false;
        };

        if !self.backend.handle_exception(fault_host_addr) {
            return false;
        }

        tracing::warn!(
            guest_addr = format_args!("0x{guest_addr:08x}"),
            fault_host_addr = format_args!("0x{fault_host_addr:016x}"),
            "fastmem fault recovered, disabling fastmem for block"
        );
        if let Some(entry) = self.code.write().get_mut(&guest_addr) {
            entry.code.fastmem = false;
        }
        self.invalidate_code(dispatch, guest_addr);
        true
    }

    /// Mark a block's compiled code as stale (but keep its meta) and unpatch
    /// every edge any other block had pointed at it, since the guest wrote
    /// to that code page and the next call must re-translate from scratch.
    /// The entry itself is kept, still reverse-lookupable, until the next
    /// recompile overwrites it or a cache flush drops it outright.
    pub fn invalidate_code(&mut self, dispatch: &mut dyn DispatchTable, guest_addr: u32) {
        self.invalidate_code_inner(dispatch, guest_addr);
        if let Some(entry) = self.code.write().get_mut(&guest_addr) {
            entry.invalidated = true;
        }
    }

    /// The core of invalidation, shared by `invalidate_code`,
    /// `free_existing`, and `flush_code_retain_meta`/`invalidate_cache`:
    /// drop the compile-unit tree and release its `compile_refs` on every
    /// meta it touched (grounded on `jit_free_compile_unit`), tell the
    /// guest dispatcher, clear this code's own outgoing edges, and restore
    /// any other code's edge that had been patched to point at it.
    fn invalidate_code_inner(&self, dispatch: &mut dyn DispatchTable, guest_addr: u32) {
        let released_units = {
            let mut code = self.code.write();
            code.get_mut(&guest_addr).map(|entry| {
                entry.code.root_unit = None;
                std::mem::take(&mut entry.code.units)
            })
        };
        if let Some(units) = released_units {
            let mut meta = self.meta.write();
            for unit in &units {
                if let Some(m) = meta.get_mut(&unit.guest_addr) {
                    m.compile_refs.retain(|r| r.code_guest_addr != guest_addr);
                }
            }
        }

        tracing::info!(guest_addr = format_args!("0x{guest_addr:08x}"), "invalidating compiled block");
        dispatch.invalidate_code(guest_addr);

        let mut code = self.code.write();
        if let Some(entry) = code.get_mut(&guest_addr) {
            entry.code.edges.clear();
        }
        for entry in code.values_mut() {
            for edge in &mut entry.code.edges {
                if edge.target_guest_addr == guest_addr && edge.patched {
                    dispatch.restore_edge(edge.branch_host_addr);
                    edge.patched = false;
                }
            }
        }
    }

    /// Whether the guest dispatcher's own cached pointer for `guest_addr`
    /// disagrees with ours — the dispatcher is the authority here, since it
    /// may have dropped or replaced the mapping independent of this engine.
    /// Grounded on `jit_is_stale`.
    fn is_stale(&self, dispatch: &dyn DispatchTable, guest_addr: u32) -> bool {
        match self.code.read().get(&guest_addr) {
            Some(entry) => dispatch.lookup_code(guest_addr) != Some(entry.code.host_addr),
            None => true,
        }
    }

    /// Lazily link a branch instruction at `branch_host_addr` straight to
    /// `dst_guest_addr`'s compiled code, if it's compiled and not stale.
    ///
    /// Grounded on `jit_add_edge`: called by the dispatch-miss thunk itself,
    /// the first time a given branch is actually taken at run time — not by
    /// the compiler. A miss here (source stale, or target not yet compiled)
    /// is silent; the branch just keeps going through the dispatcher until a
    /// later call succeeds.
    pub fn add_edge(&mut self, dispatch: &mut dyn DispatchTable, branch_host_addr: u64, dst_guest_addr: u32) {
        let Ok(src_guest_addr) = self.reverse_lookup(branch_host_addr) else {
            return;
        };
        if self.is_stale(dispatch, src_guest_addr) {
            return;
        }
        let Some(dst_host_addr) = self.lookup_code(dst_guest_addr) else {
            return;
        };

        dispatch.patch_edge(branch_host_addr, dst_host_addr);

        let mut code = self.code.write();
        if let Some(entry) = code.get_mut(&src_guest_addr) {
            match entry.code.edges.iter_mut().find(|e| e.branch_host_addr == branch_host_addr) {
                Some(edge) => edge.patched = true,
                None => entry.code.edges.push(CodeEdge {
                    branch_host_addr,
                    target_guest_addr: dst_guest_addr,
                    patched: true,
                }),
            }
        }
    }

    /// After compiling `guest_addr`, patch any edge some other
    /// already-compiled code recorded as pointing at it, because that code
    /// reached this guest address as a tree-exit thunk before this one had
    /// compiled. This is the compile-time half of edge patching; the
    /// run-time half is `add_edge`.
    fn patch_incoming_edges(&self, dispatch: &mut dyn DispatchTable, guest_addr: u32, host_addr: u64) {
        let sources: Vec<(u32, u64)> = {
            let code = self.code.read();
            code.iter()
                .filter(|&(&src_addr, _)| src_addr != guest_addr)
                .flat_map(|(&src_addr, entry)| {
                    entry
                        .code
                        .edges
                        .iter()
                        .filter(|e| e.target_guest_addr == guest_addr && !e.patched)
                        .map(move |e| (src_addr, e.branch_host_addr))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        for (src_addr, branch_host_addr) in sources {
            dispatch.patch_edge(branch_host_addr, host_addr);
            if let Some(entry) = self.code.write().get_mut(&src_addr) {
                for e in &mut entry.code.edges {
                    if e.branch_host_addr == branch_host_addr {
                        e.patched = true;
                    }
                }
            }
        }
    }

    /// Drop all compiled code but retain meta, so the next miss recompiles
    /// from already-known block shapes instead of re-analyzing guest bytes.
    /// This is the normal response to an IR-buffer overflow.
    pub fn flush_code_retain_meta(&mut self, dispatch: &mut dyn DispatchTable) {
        let addrs: Vec<u32> = self.code.read().keys().copied().collect();
        tracing::info!(entries = addrs.len(), "flushing code cache, meta retained");
        for addr in &addrs {
            self.invalidate_code_inner(dispatch, *addr);
        }
        self.code.write().clear();
        self.code_reverse.write().clear();
        self.ir_bytes_used.store(0, Ordering::Relaxed);
    }

    /// Invalidate every compiled block in place without unlinking it from
    /// the lookup maps, for use while guest code elsewhere might still be
    /// executing out of the old mappings. Distinct from `free_cache`, which
    /// tears the cache down for good. Grounded on `jit_invalidate_cache`.
    pub fn invalidate_cache(&mut self, dispatch: &mut dyn DispatchTable) {
        let addrs: Vec<u32> = self.code.read().keys().copied().collect();
        tracing::info!(entries = addrs.len(), "invalidating entire code cache");
        for addr in &addrs {
            self.invalidate_code_inner(dispatch, *addr);
        }
        let mut code = self.code.write();
        for addr in &addrs {
            if let Some(entry) = code.get_mut(addr) {
                entry.invalidated = true;
            }
        }
        drop(code);
        self.meta.write().clear();
    }

    /// Full teardown: code and meta both dropped. Only appropriate at
    /// engine shutdown, not as a response to routine cache pressure.
    pub fn free_cache(&mut self, dispatch: &mut dyn DispatchTable) {
        self.flush_code_retain_meta(dispatch);
        self.meta.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::backend::{AssembleError, AssembledCode};
    use crate::cache::{BranchType, Translation};
    use crate::error::AnalyzeError;

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

    /// One fixed one-instruction fall-through block at any address, just
    /// enough shape for the engine's compile path to exercise. Always
    /// terminates the tree immediately (`next_addr` is never analyzable),
    /// so every compile produces a single-unit tree.
    struct OneInstrFrontend;

    impl Frontend for OneInstrFrontend {
        fn analyze_code(
            &self,
            _guest: &dyn GuestMemory,
            guest_addr: u32,
        ) -> Result<BlockMeta, AnalyzeError> {
            Ok(BlockMeta::from_analysis(
                guest_addr,
                2,
                1,
                1,
                BranchType::Dynamic,
                None,
                None,
            ))
        }

        fn translate_code(
            &self,
            _guest: &dyn GuestMemory,
            units: &mut [CompileUnit],
            root: CompileUnitId,
        ) -> Result<Translation, AnalyzeError> {
            let ir = crate::ir::Ir::new();
            let (entry, _) = ir.blocks().next().expect("Ir::new always has an entry block");
            units[root.index()].block = entry;
            Ok(Translation { ir, entry, exits: Vec::new() })
        }

        fn dump_code(&self, _guest: &dyn GuestMemory, _start_addr: u32, _end_addr: u32) -> String {
            String::new()
        }
    }

    /// A backend whose `handle_exception` answer is set by the test, and
    /// whose `assemble_code` always hands back a one-byte code buffer at a
    /// fresh heap address so each compile gets a distinct `host_addr`.
    struct FaultyBackend {
        confirms_fault: bool,
    }

    impl HostBackend for FaultyBackend {
        fn reset(&mut self) {}

        fn assemble_code(&mut self, _ir: &crate::ir::Ir) -> Result<AssembledCode, AssembleError> {
            Ok(AssembledCode {
                bytes: vec![0u8; 16],
                branch_offsets: Vec::new(),
            })
        }

        fn dump_code(&self, _bytes: &[u8]) -> String {
            String::new()
        }

        fn handle_exception(&self, _fault_host_addr: u64) -> bool {
            self.confirms_fault
        }
    }

    #[derive(Default)]
    struct RecordingDispatch {
        cached: HashMap<u32, u64>,
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
        fn patch_edge(&mut self, _branch_host_addr: u64, _target_host_addr: u64) {}
        fn restore_edge(&mut self, _branch_host_addr: u64) {}
    }

    #[test]
    fn fastmem_fault_disables_fastmem_on_recompile() {
        let mut engine = JitEngine::new(
            JitConfig::default(),
            OneInstrFrontend,
            FaultyBackend { confirms_fault: true },
        );
        let mut dispatch = RecordingDispatch::default();
        let guest = NullMemory;

        engine.compile_code(&guest, &mut dispatch, 0x1000).unwrap();
        let code_before = engine.code.read().get(&0x1000).unwrap().code.clone();
        assert!(code_before.fastmem);

        let recovered = engine.handle_exception(&mut dispatch, code_before.host_addr);
        assert!(recovered);
        assert!(dispatch.invalidated.contains(&0x1000));
        assert!(engine.lookup_code(0x1000).is_none());

        engine.compile_code(&guest, &mut dispatch, 0x1000).unwrap();
        let code_after = engine.code.read().get(&0x1000).unwrap().code.clone();
        assert!(!code_after.fastmem);
    }

    #[test]
    fn unrelated_fault_is_declined() {
        let mut engine = JitEngine::new(
            JitConfig::default(),
            OneInstrFrontend,
            FaultyBackend { confirms_fault: false },
        );
        let mut dispatch = RecordingDispatch::default();
        let guest = NullMemory;

        engine.compile_code(&guest, &mut dispatch, 0x2000).unwrap();
        let host_addr = engine.lookup_code(0x2000).unwrap();

        let recovered = engine.handle_exception(&mut dispatch, host_addr);
        assert!(!recovered);
        assert!(dispatch.invalidated.is_empty());
        assert!(engine.lookup_code(0x2000).is_some());
    }

    #[test]
    fn invalidate_cache_keeps_entries_resident_but_stale() {
        let mut engine = JitEngine::new(
            JitConfig::default(),
            OneInstrFrontend,
            FaultyBackend { confirms_fault: true },
        );
        let mut dispatch = RecordingDispatch::default();
        let guest = NullMemory;

        engine.compile_code(&guest, &mut dispatch, 0x4000).unwrap();
        let host_addr = engine.lookup_code(0x4000).unwrap();

        engine.invalidate_cache(&mut dispatch);

        assert!(engine.lookup_code(0x4000).is_none());
        assert!(engine.reverse_lookup(host_addr).is_ok());
        assert!(engine.meta(0x4000).is_none());
    }
}
