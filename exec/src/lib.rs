//! Execution engine: block cache, background compiler and the
//! per-thread dispatcher.
//!
//! A single [`Translator`] is shared by every guest thread. Each
//! thread runs a [`CpuThread`] that looks units up through a private
//! jump cache, falls back to the interpreter while a unit is being
//! compiled, and services the callbacks compiled code makes.

mod block_cache;
mod config;
mod diagnostics;
mod exec_loop;
mod profile;
mod stats;
mod translator;
mod worker;

pub use block_cache::{BlockCache, CacheStats, CompiledEntry};
pub use config::{CompileMode, ExecConfig};
pub use diagnostics::ExecDiagnostics;
pub use exec_loop::{
    CpuThread, ExitOnlySyscalls, ExitReason, SyscallAction, SyscallHandler, CELL_ENOSYS,
};
pub use profile::CallTargets;
pub use stats::{ExecStats, FallbackCount, FallbackStats};
pub use translator::{Shared, Translator, MAX_UNIT_OPS};

use ppujit_backend::CodegenError;

/// Why a unit could not be compiled. The address is then always
/// interpreted.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("address {0:#010x} is not fetchable code")]
    NotFetchable(u32),
    #[error("unit at {addr:#010x} is too large ({ops} ops)")]
    TooLarge { addr: u32, ops: usize },
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}
