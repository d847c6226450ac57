//! Compile-time diagnostics with a session pause signal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ppujit_frontend::{CompileDiagnostics, LogDiagnostics};

/// Logs like [`LogDiagnostics`] and raises the pause flag that every
/// [`CpuThread`](crate::CpuThread) polls.
#[derive(Debug, Default)]
pub struct ExecDiagnostics {
    paused: AtomicBool,
    errors: AtomicU64,
    unknown: AtomicU64,
}

impl ExecDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    pub fn compilation_errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn unknown_instructions(&self) -> u64 {
        self.unknown.load(Ordering::Relaxed)
    }
}

impl CompileDiagnostics for ExecDiagnostics {
    fn compilation_error(&self, addr: u32, msg: &str) {
        LogDiagnostics.compilation_error(addr, msg);
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.pause();
    }

    fn unknown_instruction(&self, addr: u32, word: u32) {
        LogDiagnostics.unknown_instruction(addr, word);
        self.unknown.fetch_add(1, Ordering::Relaxed);
        self.pause();
    }
}
