//! Execution-engine configuration.

use std::time::Duration;

use ppujit_frontend::LowerConfig;

/// How a dispatcher reacts to an address that has no compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// Wait for the worker to publish (or give up on) the unit.
    Synchronous,
    /// Interpret one instruction and look again later.
    #[default]
    Asynchronous,
}

/// Knobs shared by the translator, its worker and every CPU thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecConfig {
    pub compile_mode: CompileMode,
    /// Misses of an address needed before it is queued.
    pub hotness_threshold: u32,
    pub max_block_insns: u32,
    /// Furthest forward distance in bytes a branch may target and
    /// still stay inside its unit.
    pub local_branch_window: u32,
    /// Nesting limit for block-cache calls.
    pub max_call_depth: u32,
    /// Run the IR optimizer before code generation.
    pub optimize: bool,
    /// Queue statically known callees after compiling a unit.
    pub prefetch_callees: bool,
    /// Upper bound on one worker wait before it re-checks its queue.
    pub worker_poll_interval: Duration,
    /// Dispatcher iterations allowed per `run` call.
    pub max_dispatches: Option<u64>,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            compile_mode: CompileMode::Asynchronous,
            hotness_threshold: 1,
            max_block_insns: 512,
            local_branch_window: 1024,
            max_call_depth: 256,
            optimize: true,
            prefetch_callees: false,
            worker_poll_interval: Duration::from_millis(50),
            max_dispatches: None,
        }
    }
}

impl ExecConfig {
    pub fn with_compile_mode(mut self, mode: CompileMode) -> Self {
        self.compile_mode = mode;
        self
    }

    pub fn with_hotness_threshold(mut self, n: u32) -> Self {
        self.hotness_threshold = n.max(1);
        self
    }

    pub fn with_max_block_insns(mut self, n: u32) -> Self {
        self.max_block_insns = n;
        self
    }

    pub fn with_local_branch_window(mut self, bytes: u32) -> Self {
        self.local_branch_window = bytes;
        self
    }

    pub fn with_max_call_depth(mut self, depth: u32) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_optimize(mut self, on: bool) -> Self {
        self.optimize = on;
        self
    }

    pub fn with_prefetch_callees(mut self, on: bool) -> Self {
        self.prefetch_callees = on;
        self
    }

    pub fn with_worker_poll_interval(mut self, d: Duration) -> Self {
        self.worker_poll_interval = d;
        self
    }

    pub fn with_max_dispatches(mut self, n: Option<u64>) -> Self {
        self.max_dispatches = n;
        self
    }

    /// Frontend settings derived from this configuration.
    pub fn lower_config(&self) -> LowerConfig {
        LowerConfig {
            max_insns: self.max_block_insns,
            local_branch_window: self.local_branch_window,
            mmio_fork: true,
        }
    }
}
