//! Counters reported by the translator and the dispatchers.

use std::sync::atomic::{AtomicU64, Ordering};

use ppujit_decode::class::InsnClass;

/// Per-class interpreter fallback counts.
///
/// `emitted` counts fallback calls placed in compiled units;
/// `executed` counts how often those calls actually ran.
pub struct FallbackStats {
    emitted: Box<[AtomicU64]>,
    executed: Box<[AtomicU64]>,
}

/// One row of [`FallbackStats::report`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackCount {
    pub class: InsnClass,
    pub emitted: u64,
    pub executed: u64,
}

fn counters() -> Box<[AtomicU64]> {
    (0..InsnClass::COUNT).map(|_| AtomicU64::new(0)).collect()
}

impl FallbackStats {
    pub fn new() -> Self {
        Self {
            emitted: counters(),
            executed: counters(),
        }
    }

    pub fn note_emitted(&self, class: InsnClass) {
        if let Some(c) = self.emitted.get(class.index()) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn note_executed(&self, class: InsnClass) {
        if let Some(c) = self.executed.get(class.index()) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn emitted(&self, class: InsnClass) -> u64 {
        self.emitted
            .get(class.index())
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn executed(&self, class: InsnClass) -> u64 {
        self.executed
            .get(class.index())
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Classes with any fallback activity, most executed first.
    pub fn report(&self) -> Vec<FallbackCount> {
        let mut rows: Vec<FallbackCount> = InsnClass::ALL
            .iter()
            .map(|&class| FallbackCount {
                class,
                emitted: self.emitted(class),
                executed: self.executed(class),
            })
            .filter(|r| r.emitted != 0 || r.executed != 0)
            .collect();
        rows.sort_by(|a, b| {
            b.executed
                .cmp(&a.executed)
                .then(b.emitted.cmp(&a.emitted))
                .then(a.class.name().cmp(b.class.name()))
        });
        rows
    }
}

impl Default for FallbackStats {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FallbackStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.report()).finish()
    }
}

/// Per-thread dispatcher counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecStats {
    /// Dispatcher iterations.
    pub dispatches: u64,
    /// Compiled units entered.
    pub compiled_executions: u64,
    /// Instructions run by the interpreter while no unit was ready.
    pub interpreted_steps: u64,
    /// Block-cache calls made by compiled code.
    pub block_calls: u64,
}
