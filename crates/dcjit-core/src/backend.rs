//! Host code generator contract.
//!
//! Turning an [`Ir`] module into executable host machine code is explicitly
//! out of scope for this crate — it's a large, architecture-specific
//! concern the original project gives its own `x64_backend`. What this
//! crate owns is the seam: a `HostBackend` trait any such code generator
//! plugs into, plus a `StubBackend` that satisfies the trait for tests and
//! for `recc`'s dry-run / dump-only modes.

use thiserror::Error;

use crate::ir::Ir;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("stub backend cannot assemble code; pass a real HostBackend")]
    NoBackend,
}

/// A compiled code buffer: host machine code plus the offsets into it that
/// the engine needs for edge patching.
#[derive(Debug, Clone, Default)]
pub struct AssembledCode {
    pub bytes: Vec<u8>,
    /// Byte offsets of direct-branch instructions eligible for edge
    /// patching, in the order the IR's branch instructions were emitted.
    pub branch_offsets: Vec<usize>,
}

pub trait HostBackend {
    /// Reset any per-compile-unit scratch state. Called before each
    /// `assemble_code`.
    fn reset(&mut self);

    fn assemble_code(&mut self, ir: &Ir) -> Result<AssembledCode, AssembleError>;

    /// Render `bytes` (a previously assembled code buffer) as a
    /// human-readable disassembly listing, for `recc`'s dump mode.
    fn dump_code(&self, bytes: &[u8]) -> String;

    /// Decide whether a host fault at `fault_host_addr` originated from one
    /// of this backend's fastmem-path memory instructions. `true` means the
    /// engine should clear `Code::fastmem` and invalidate the owning block;
    /// `false` means the fault is unrelated and must propagate to the OS.
    fn handle_exception(&self, fault_host_addr: u64) -> bool;
}

/// A backend that performs no code generation. `assemble_code` always
/// returns [`AssembleError::NoBackend`]; exists so callers that only want
/// the IR and pass pipeline (e.g. `recc` with dumps but no `--emit`) don't
/// need an `Option<Box<dyn HostBackend>>` threaded through the engine.
#[derive(Debug, Default)]
pub struct StubBackend;

impl HostBackend for StubBackend {
    fn reset(&mut self) {}

    fn assemble_code(&mut self, _ir: &Ir) -> Result<AssembledCode, AssembleError> {
        Err(AssembleError::NoBackend)
    }

    fn dump_code(&self, _bytes: &[u8]) -> String {
        String::new()
    }

    fn handle_exception(&self, _fault_host_addr: u64) -> bool {
        false
    }
}

#[cfg(feature = "cranelift")]
pub use cranelift_support::CraneliftTargetInfo;

#[cfg(feature = "cranelift")]
mod cranelift_support {
    use cranelift_codegen::isa::CallConv;
    use target_lexicon::Triple;

    /// Host target/register enumeration only — no code generation. A real
    /// Cranelift-backed `HostBackend` would build on `cranelift-codegen`'s
    /// `TargetIsa` the way this reads it, but wiring up `cranelift-jit`'s
    /// module/linker machinery is out of scope here.
    #[derive(Debug, Clone)]
    pub struct CraneliftTargetInfo {
        pub triple: Triple,
        pub default_call_conv: CallConv,
    }

    impl CraneliftTargetInfo {
        pub fn host() -> Option<CraneliftTargetInfo> {
            let isa_builder = cranelift_native::builder().ok()?;
            let triple = isa_builder.triple().clone();
            let default_call_conv = CallConv::triple_default(&triple);
            Some(CraneliftTargetInfo {
                triple,
                default_call_conv,
            })
        }
    }
}
