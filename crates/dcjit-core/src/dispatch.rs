//! External dispatcher contract.
//!
//! Grounded on `jit_guest`'s own split between a "memory interface" (the
//! r8/r16/.../w64 callbacks) and a "dispatch interface" (cache lookup and
//! edge patching): the original bundles both into one struct of function
//! pointers, carried alongside frontend/backend pointers on the `jit`
//! struct itself. Here they're two traits so a host can implement (and a
//! test can mock) either independently.

/// Guest address space access, as seen by the front end during analysis and
/// by the engine's slow-path memory ops.
pub trait GuestMemory {
    fn r8(&self, addr: u32) -> u8;
    fn r16(&self, addr: u32) -> u16;
    fn r32(&self, addr: u32) -> u32;
    fn r64(&self, addr: u32) -> u64;
    fn w8(&mut self, addr: u32, v: u8);
    fn w16(&mut self, addr: u32, v: u16);
    fn w32(&mut self, addr: u32, v: u32);
    fn w64(&mut self, addr: u32, v: u64);
}

/// What the engine needs from the surrounding dispatcher loop: compiled
/// code lookup and the edge-patching hooks that let one compiled block jump
/// directly into another without returning to the dispatcher.
pub trait DispatchTable {
    /// Host entry point for the compiled code at `guest_addr`, or `None` on
    /// a cache miss (the caller should compile it and register the result).
    fn lookup_code(&self, guest_addr: u32) -> Option<u64>;

    /// Register newly compiled code at `guest_addr`, entering at `host_addr`.
    fn cache_code(&mut self, guest_addr: u32, host_addr: u64);

    /// Drop the cache entry (and any patched edges into it) for `guest_addr`,
    /// e.g. because the guest wrote to that code page.
    fn invalidate_code(&mut self, guest_addr: u32);

    /// Rewrite a direct branch at `branch_host_addr` to jump straight to
    /// `target_host_addr`, bypassing the dispatcher for that edge.
    fn patch_edge(&mut self, branch_host_addr: u64, target_host_addr: u64);

    /// Undo a previous `patch_edge`, restoring the dispatcher trampoline.
    fn restore_edge(&mut self, branch_host_addr: u64);
}
