//! Address-keyed cache of compiled units with revision gating.
//!
//! Two independent locks:
//!
//! - the *pending* lock guards the set of addresses requested but not
//!   yet compiled, the worker queue, per-address miss counts and the
//!   permanently failed set;
//! - the *compiled* lock guards the address → entry map.
//!
//! When a path needs both, it takes the compiled lock first; the
//! pending lock is never held while the compiled lock is acquired.
//! Lookup, publish and invalidation each decide under the compiled
//! lock, and the invalidation epoch only moves there, so a publish
//! either lands before an invalidation (and is swept by it) or sees
//! the new epoch and is dropped.
//!
//! Entries are shared as `Arc`s: invalidation only unlinks them from
//! the map, and a thread still running an entry keeps it alive.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ppujit_backend::CompiledCode;
use tracing::debug;

/// A published unit.
#[derive(Debug)]
pub struct CompiledEntry {
    pub address: u32,
    pub revision: u64,
    /// Invalidation epoch the unit was compiled under.
    pub epoch: u64,
    pub code: CompiledCode,
    /// Guest bytes covered.
    pub size: u32,
    pub instruction_count: u32,
    /// Instructions routed through the interpreter.
    pub fallbacks: u32,
    /// Statically known callees.
    pub callees: Vec<u32>,
    pub has_indirect: bool,
    /// Ends with a plain return through LR.
    pub returns: bool,
}

impl CompiledEntry {
    /// Whether `[addr, addr + len)` intersects the guest code this
    /// entry was compiled from.
    pub fn overlaps(&self, addr: u32, len: u32) -> bool {
        let a = addr as u64;
        let b = a + len as u64;
        let lo = self.address as u64;
        let hi = lo + self.size as u64;
        a < hi && lo < b
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub enqueues: u64,
    pub compiles: u64,
    pub failures: u64,
    pub invalidations: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    enqueues: AtomicU64,
    compiles: AtomicU64,
    failures: AtomicU64,
    invalidations: AtomicU64,
}

#[derive(Default)]
struct PendingState {
    /// Requested, not yet published or failed.
    pending: HashSet<u32>,
    /// Pending addresses the worker has not picked up.
    queue: VecDeque<u32>,
    /// Misses seen per address before it was queued.
    hits: HashMap<u32, u32>,
    /// Addresses whose compilation failed; always interpreted.
    failed: HashSet<u32>,
}

impl PendingState {
    fn enqueue(&mut self, addr: u32) -> bool {
        if !self.pending.insert(addr) {
            return false;
        }
        self.hits.remove(&addr);
        self.queue.push_back(addr);
        true
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct BlockCache {
    pending: Mutex<PendingState>,
    /// Signals the worker that the queue is non-empty.
    work: Condvar,
    /// Signals waiters that an address left the pending set.
    settled: Condvar,
    compiled: Mutex<HashMap<u32, Arc<CompiledEntry>>>,
    revision: AtomicU64,
    epoch: AtomicU64,
    shutdown: AtomicBool,
    hotness_threshold: u32,
    counters: Counters,
}

impl BlockCache {
    pub fn new(hotness_threshold: u32) -> Self {
        Self {
            pending: Mutex::new(PendingState::default()),
            work: Condvar::new(),
            settled: Condvar::new(),
            compiled: Mutex::new(HashMap::new()),
            revision: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            hotness_threshold: hotness_threshold.max(1),
            counters: Counters::default(),
        }
    }

    // -- Lookup / publish --------------------------------------------

    /// Compiled unit for `addr`, or `None` after counting the miss and
    /// queueing the address once it is hot enough. Never blocks
    /// beyond lock acquisition.
    pub fn lookup(&self, addr: u32) -> Option<Arc<CompiledEntry>> {
        let map = lock(&self.compiled);
        if let Some(e) = map.get(&addr) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(e));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let mut st = lock(&self.pending);
        if st.failed.contains(&addr) || st.pending.contains(&addr) {
            return None;
        }
        let hits = st.hits.entry(addr).or_insert(0);
        *hits += 1;
        if *hits >= self.hotness_threshold {
            self.push(&mut st, addr);
        }
        None
    }

    /// Queue `addr` regardless of its miss count.
    pub fn request(&self, addr: u32) -> bool {
        let map = lock(&self.compiled);
        let mut st = lock(&self.pending);
        if st.failed.contains(&addr) || map.contains_key(&addr) {
            return false;
        }
        self.push(&mut st, addr)
    }

    /// Take `addr` for compilation on the calling thread.
    ///
    /// Succeeds when the address is queued (it is taken off the worker
    /// queue) or not requested at all (it becomes pending). Fails when
    /// it already has an entry, has failed, or is being compiled
    /// elsewhere; the caller then waits with [`BlockCache::wait_settled`].
    /// A successful claim must end in `publish` or `fail`.
    pub fn claim(&self, addr: u32) -> bool {
        let map = lock(&self.compiled);
        let mut st = lock(&self.pending);
        if st.failed.contains(&addr) || map.contains_key(&addr) {
            return false;
        }
        if st.pending.insert(addr) {
            st.hits.remove(&addr);
            return true;
        }
        match st.queue.iter().position(|&a| a == addr) {
            Some(i) => {
                st.queue.remove(i);
                true
            }
            None => false,
        }
    }

    fn push(&self, st: &mut PendingState, addr: u32) -> bool {
        if !st.enqueue(addr) {
            return false;
        }
        self.counters.enqueues.fetch_add(1, Ordering::Relaxed);
        debug!(addr = format_args!("{addr:#010x}"), "queued for compilation");
        self.work.notify_one();
        true
    }

    /// Install `entry` and clear its address from the pending set.
    ///
    /// An entry compiled under an older invalidation epoch is
    /// discarded instead: the guest bytes it was built from may have
    /// changed while it compiled. Returns whether it was installed.
    pub fn publish(&self, entry: CompiledEntry) -> bool {
        let addr = entry.address;
        let mut map = lock(&self.compiled);
        let current = entry.epoch == self.epoch.load(Ordering::Acquire);
        if current {
            map.insert(addr, Arc::new(entry));
            self.counters.compiles.fetch_add(1, Ordering::Relaxed);
        } else {
            debug!(addr = format_args!("{addr:#010x}"), "dropping stale compilation");
        }

        let mut st = lock(&self.pending);
        st.pending.remove(&addr);
        self.settled.notify_all();
        current
    }

    /// Give up on `addr`: it stays interpreted from now on. Returns
    /// `true` the first time an address fails.
    pub fn fail(&self, addr: u32) -> bool {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
        let mut st = lock(&self.pending);
        st.pending.remove(&addr);
        let first = st.failed.insert(addr);
        self.settled.notify_all();
        first
    }

    // -- Revisions and invalidation ----------------------------------

    /// Revision for the next compiled unit.
    pub fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Newest revision handed out.
    pub fn current_revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Bumped by every invalidation; per-thread caches compare it.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Drop every entry whose revision is below `n`. Returns how
    /// many were dropped.
    pub fn invalidate_revision_older_than(&self, n: u64) -> usize {
        self.invalidate_where(|e| e.revision < n)
    }

    pub fn invalidate_all(&self) -> usize {
        self.invalidate_revision_older_than(self.current_revision() + 1)
    }

    /// Drop entries compiled from guest bytes in `[addr, addr + len)`.
    pub fn invalidate_range(&self, addr: u32, len: u32) -> usize {
        self.invalidate_where(|e| e.overlaps(addr, len))
    }

    fn invalidate_where(&self, pred: impl Fn(&CompiledEntry) -> bool) -> usize {
        let dropped = {
            let mut map = lock(&self.compiled);
            self.epoch.fetch_add(1, Ordering::AcqRel);
            let before = map.len();
            map.retain(|_, e| !pred(e));
            before - map.len()
        };
        self.counters
            .invalidations
            .fetch_add(dropped as u64, Ordering::Relaxed);
        debug!(dropped, "invalidated compiled units");
        dropped
    }

    // -- Worker side -------------------------------------------------

    /// Block until the queue has work or shutdown is requested, then
    /// take everything queued. `None` means shut down.
    pub fn wait_for_work(&self, poll: Duration) -> Option<Vec<u32>> {
        let mut st = lock(&self.pending);
        loop {
            if self.is_shut_down() {
                return None;
            }
            if !st.queue.is_empty() {
                return Some(st.queue.drain(..).collect());
            }
            st = self
                .work
                .wait_timeout(st, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Block until `addr` is no longer pending. Returns `false` if
    /// the cache shut down first.
    pub fn wait_settled(&self, addr: u32, poll: Duration) -> bool {
        let mut st = lock(&self.pending);
        while st.pending.contains(&addr) {
            if self.is_shut_down() {
                return false;
            }
            st = self
                .settled
                .wait_timeout(st, poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        // Take the lock so no waiter misses the wakeup between its
        // flag check and its wait.
        let _st = lock(&self.pending);
        self.work.notify_all();
        self.settled.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    // -- Introspection -----------------------------------------------

    pub fn is_pending(&self, addr: u32) -> bool {
        lock(&self.pending).pending.contains(&addr)
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.pending).pending.len()
    }

    pub fn has_failed(&self, addr: u32) -> bool {
        lock(&self.pending).failed.contains(&addr)
    }

    /// Entry for `addr` without touching the miss accounting.
    pub fn peek(&self, addr: u32) -> Option<Arc<CompiledEntry>> {
        lock(&self.compiled).get(&addr).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.compiled).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            enqueues: c.enqueues.load(Ordering::Relaxed),
            compiles: c.compiles.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
        }
    }
}
