//! The process-wide translator service.
//!
//! One [`Translator`] owns the block cache, the compiler worker and
//! the shared diagnostics. CPU threads hold it through an `Arc`; the
//! worker holds only the [`Shared`] half, so dropping the last
//! `Translator` handle stops and joins the worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use ppujit_backend::ThreadedCodeGen;
use ppujit_core::context::MAX_TEMPS;
use ppujit_core::{Context, GuestMemory};
use ppujit_frontend::translate_block;
use tracing::{debug, warn};

use crate::block_cache::{BlockCache, CompiledEntry};
use crate::config::ExecConfig;
use crate::diagnostics::ExecDiagnostics;
use crate::profile::CallTargets;
use crate::stats::FallbackStats;
use crate::{worker, CompileError};

/// Ops allowed in one unit before it is rejected.
pub const MAX_UNIT_OPS: usize = 1 << 18;

/// State shared between the translator handle and its worker.
pub struct Shared {
    pub config: ExecConfig,
    pub mem: Arc<dyn GuestMemory>,
    pub cache: BlockCache,
    pub diag: ExecDiagnostics,
    pub profile: CallTargets,
    pub fallbacks: FallbackStats,
    backend: ThreadedCodeGen,
    compile_counts: Mutex<HashMap<u32, u32>>,
}

impl Shared {
    fn new(config: ExecConfig, mem: Arc<dyn GuestMemory>) -> Self {
        Self {
            cache: BlockCache::new(config.hotness_threshold),
            config,
            mem,
            diag: ExecDiagnostics::new(),
            profile: CallTargets::new(),
            fallbacks: FallbackStats::new(),
            backend: ThreadedCodeGen::new(),
            compile_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Lower, optimize and generate the unit at `addr`.
    pub fn compile(&self, ir: &mut Context, addr: u32) -> Result<CompiledEntry, CompileError> {
        if addr & 3 != 0 || self.mem.is_mmio(addr) {
            return Err(CompileError::NotFetchable(addr));
        }
        let epoch = self.cache.epoch();
        *self
            .compile_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(addr)
            .or_insert(0) += 1;

        let lowered = translate_block(
            ir,
            self.mem.as_ref(),
            addr,
            &self.config.lower_config(),
            &self.diag,
            Some(&self.profile),
        );
        if ir.num_ops() > MAX_UNIT_OPS || ir.nb_temps() as usize >= MAX_TEMPS {
            return Err(CompileError::TooLarge {
                addr,
                ops: ir.num_ops(),
            });
        }
        for &class in &lowered.fallbacks {
            self.fallbacks.note_emitted(class);
        }

        let code = ppujit_backend::translate(ir, &self.backend, self.config.optimize)?;
        let revision = self.cache.next_revision();
        debug!(
            addr = format_args!("{addr:#010x}"),
            revision,
            steps = code.len(),
            "compiled"
        );
        Ok(CompiledEntry {
            address: addr,
            revision,
            epoch,
            code,
            size: lowered.tb.size,
            instruction_count: lowered.tb.icount,
            fallbacks: lowered.tb.fallbacks,
            callees: lowered.info.callees,
            has_indirect: lowered.info.has_indirect,
            returns: lowered.info.returns,
        })
    }

    /// Times compilation of `addr` has started.
    pub fn compile_count(&self, addr: u32) -> u32 {
        self.compile_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&addr)
            .copied()
            .unwrap_or(0)
    }
}

/// Handle to the shared translator.
pub struct Translator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Translator {
    /// Create the translator and start its worker.
    pub fn start(config: ExecConfig, mem: Arc<dyn GuestMemory>) -> std::io::Result<Arc<Self>> {
        let shared = Arc::new(Shared::new(config, mem));
        let handle = worker::spawn(Arc::clone(&shared))?;
        Ok(Arc::new(Self {
            shared,
            worker: Mutex::new(Some(handle)),
        }))
    }

    /// A translator without a worker thread; units are only compiled
    /// through [`Translator::compile_now`].
    pub fn without_worker(config: ExecConfig, mem: Arc<dyn GuestMemory>) -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(Shared::new(config, mem)),
            worker: Mutex::new(None),
        })
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn config(&self) -> &ExecConfig {
        &self.shared.config
    }

    pub fn memory(&self) -> &dyn GuestMemory {
        self.shared.mem.as_ref()
    }

    pub fn cache(&self) -> &BlockCache {
        &self.shared.cache
    }

    pub fn diagnostics(&self) -> &ExecDiagnostics {
        &self.shared.diag
    }

    pub fn profile(&self) -> &CallTargets {
        &self.shared.profile
    }

    pub fn fallback_stats(&self) -> &FallbackStats {
        &self.shared.fallbacks
    }

    pub fn compile_count(&self, addr: u32) -> u32 {
        self.shared.compile_count(addr)
    }

    pub fn has_worker(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Compile and publish `addr` on the calling thread. This does not
    /// consult the pending set; concurrent callers should go through
    /// [`BlockCache::claim`] first.
    pub fn compile_now(&self, addr: u32) -> Option<Arc<CompiledEntry>> {
        let mut ir = Context::new();
        worker::compile_one(&self.shared, &mut ir, addr);
        self.shared.cache.peek(addr)
    }

    /// Guest code in `[addr, addr + len)` was overwritten.
    pub fn invalidate_range(&self, addr: u32, len: u32) -> usize {
        self.shared.cache.invalidate_range(addr, len)
    }

    pub fn invalidate_all(&self) -> usize {
        self.shared.cache.invalidate_all()
    }

    /// Stop the worker and wait for it. Idempotent.
    pub fn shutdown(&self) {
        self.shared.cache.shutdown();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(h) = handle {
            if h.join().is_err() {
                warn!("compiler worker panicked");
            }
        }
    }
}

impl Drop for Translator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
