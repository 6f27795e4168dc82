//! Error taxonomy shared across the crate.
//!
//! Each subsystem gets its own enum rather than one crate-wide error, so a
//! caller holding, say, an `AnalyzeError` never has to match on variants
//! that could only come from the cache.

use thiserror::Error;

use crate::ir::IrParseError;

/// Front end failures: decoding or classifying guest instructions.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("invalid guest opcode 0x{raw:08x} at 0x{addr:08x}")]
    InvalidOpcode { addr: u32, raw: u32 },
    #[error("guest address 0x{addr:08x} is not aligned to {align} bytes")]
    Misaligned { addr: u32, align: u32 },
    #[error("basic block at 0x{addr:08x} exceeded the maximum instruction count")]
    BlockTooLong { addr: u32 },
}

/// Code cache failures: compile, lookup, and edge-patching errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no compiled code registered for guest address 0x{addr:08x}")]
    NotFound { addr: u32 },
    #[error("host address 0x{host_addr:016x} does not fall inside any compiled code region")]
    HostAddrNotFound { host_addr: u64 },
    #[error("edge from 0x{src:08x} to 0x{dst:08x} references code that is not resident")]
    DanglingEdge { src: u32, dst: u32 },
    #[error("ir buffer exhausted after {bytes_used} bytes (limit {limit})")]
    IrBufferExhausted { bytes_used: usize, limit: usize },
}

/// Top-level engine failures, wrapping the subsystem-specific errors plus
/// the textual IR round-trip contract (`recc` surfaces this one directly).
#[derive(Debug, Error)]
pub enum JitError {
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("malformed IR: {0}")]
    Parse(#[from] IrParseError),
    #[error("host backend failed to assemble code: {0}")]
    Assemble(String),
}
