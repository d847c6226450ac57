//! Per-thread dispatcher.
//!
//! A [`CpuThread`] drives one guest hardware thread: look up the unit
//! at `pc`, run it, and follow its exit code. With no unit ready it
//! interprets a single instruction and looks again. It is also the
//! [`Runtime`] compiled code calls back into, so a block-cache call
//! from inside a unit is a nested dispatch that returns when the
//! callee returns.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ppujit_core::{
    GuestMemory, JumpCache, Runtime, StopReason, EXIT_HALT, EXIT_RETURN,
};
use ppujit_decode::class::InsnClass;
use ppujit_guest::{interp, CpuState, Status};
use tracing::{debug, trace, warn};

use crate::block_cache::CompiledEntry;
use crate::config::CompileMode;
use crate::stats::ExecStats;
use crate::translator::Translator;

/// Why [`CpuThread::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The outermost function returned; `pc` holds the return
    /// address.
    Returned,
    /// A helper, the interpreter or a syscall asked to stop.
    Stopped(StopReason),
    /// The session was paused by a compilation diagnostic.
    Paused,
    /// Block-cache calls nested deeper than the configured limit.
    CallDepthExceeded { depth: u32 },
    /// The dispatch budget ran out.
    BudgetExhausted,
    /// The translator shut down while a unit was awaited.
    Shutdown,
    /// A unit exited with the halt code without saying why.
    Halted { pc: u32 },
}

// -- Syscalls ---------------------------------------------------------

/// What to do after a system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallAction {
    Continue,
    Exit(i64),
}

/// Services `sc`. `pc` already points past the instruction.
pub trait SyscallHandler {
    fn syscall(&mut self, cpu: &mut CpuState, mem: &dyn GuestMemory) -> SyscallAction;
}

/// Error code returned for unimplemented system calls.
pub const CELL_ENOSYS: u64 = 0x8001_0003;

/// Knows only process exit (numbers 3 and 22 in r11, status in r3).
/// Everything else fails with [`CELL_ENOSYS`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitOnlySyscalls;

impl SyscallHandler for ExitOnlySyscalls {
    fn syscall(&mut self, cpu: &mut CpuState, _mem: &dyn GuestMemory) -> SyscallAction {
        match cpu.gpr[11] {
            3 | 22 => SyscallAction::Exit(cpu.gpr[3] as i64),
            n => {
                warn!(num = n, pc = format_args!("{:#010x}", cpu.pc), "unimplemented syscall");
                cpu.gpr[3] = CELL_ENOSYS;
                SyscallAction::Continue
            }
        }
    }
}

// -- Dispatcher -------------------------------------------------------

/// How a (possibly nested) dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leave {
    Returned,
    Halted,
}

pub struct CpuThread {
    translator: Arc<Translator>,
    jump_cache: RefCell<JumpCache<Arc<CompiledEntry>>>,
    seen_epoch: Cell<u64>,
    depth: Cell<u32>,
    halt: Cell<Option<ExitReason>>,
    budget: Cell<Option<u64>>,
    stats: Cell<ExecStats>,
    syscalls: RefCell<Box<dyn SyscallHandler>>,
}

impl CpuThread {
    pub fn new(translator: Arc<Translator>) -> Self {
        Self::with_syscalls(translator, Box::new(ExitOnlySyscalls))
    }

    pub fn with_syscalls(translator: Arc<Translator>, syscalls: Box<dyn SyscallHandler>) -> Self {
        let epoch = translator.cache().epoch();
        Self {
            translator,
            jump_cache: RefCell::new(JumpCache::new()),
            seen_epoch: Cell::new(epoch),
            depth: Cell::new(0),
            halt: Cell::new(None),
            budget: Cell::new(None),
            stats: Cell::new(ExecStats::default()),
            syscalls: RefCell::new(syscalls),
        }
    }

    pub fn translator(&self) -> &Arc<Translator> {
        &self.translator
    }

    pub fn stats(&self) -> ExecStats {
        self.stats.get()
    }

    /// Run from `cpu.pc` until the outermost function returns or
    /// something stops execution.
    pub fn run(&self, cpu: &mut CpuState) -> ExitReason {
        self.halt.set(None);
        self.depth.set(0);
        self.budget.set(self.translator.config().max_dispatches);
        let env = cpu.as_env_ptr();
        // SAFETY: `cpu` is exclusively borrowed for the whole run and
        // only reached through `env` until `dispatch` returns.
        let leave = unsafe { self.dispatch(env) };
        let reason = match leave {
            Leave::Returned => ExitReason::Returned,
            Leave::Halted => self.halt.take().unwrap_or(ExitReason::Halted {
                pc: cpu.pc as u32,
            }),
        };
        debug!(?reason, pc = format_args!("{:#010x}", cpu.pc), "dispatcher exit");
        reason
    }

    fn bump(&self, f: impl FnOnce(&mut ExecStats)) {
        let mut s = self.stats.get();
        f(&mut s);
        self.stats.set(s);
    }

    fn set_halt(&self, reason: ExitReason) {
        let cur = self.halt.take();
        self.halt.set(cur.or(Some(reason)));
    }

    fn halted(&self) -> bool {
        let cur = self.halt.take();
        let set = cur.is_some();
        self.halt.set(cur);
        set
    }

    fn paused(&self) -> bool {
        let paused = self.translator.diagnostics().is_paused();
        if paused {
            self.set_halt(ExitReason::Paused);
        }
        paused
    }

    /// Stop, pause and budget checks made before every dispatch.
    fn poll(&self) -> bool {
        if self.halted() || self.paused() {
            return true;
        }
        match self.budget.get() {
            Some(0) => {
                self.set_halt(ExitReason::BudgetExhausted);
                true
            }
            Some(n) => {
                self.budget.set(Some(n - 1));
                false
            }
            None => false,
        }
    }

    /// Compiled unit for `pc`, if one is ready.
    fn find(&self, pc: u32) -> Option<Arc<CompiledEntry>> {
        let cache = self.translator.cache();
        let epoch = cache.epoch();
        if epoch != self.seen_epoch.get() {
            self.jump_cache.borrow_mut().invalidate();
            self.seen_epoch.set(epoch);
        }
        if let Some(e) = self.jump_cache.borrow().lookup(pc) {
            return Some(Arc::clone(e));
        }

        let mut found = cache.lookup(pc);
        if found.is_none() && self.translator.config().compile_mode == CompileMode::Synchronous {
            found = self.wait_for(pc);
        }
        if let Some(e) = &found {
            self.jump_cache.borrow_mut().insert(pc, Arc::clone(e));
        }
        found
    }

    fn wait_for(&self, pc: u32) -> Option<Arc<CompiledEntry>> {
        let cache = self.translator.cache();
        if cache.has_failed(pc) {
            return None;
        }
        if cache.is_shut_down() {
            self.set_halt(ExitReason::Shutdown);
            return None;
        }
        // Without a worker the thread that claims the address compiles
        // it; everyone else waits for that thread to publish.
        if !self.translator.has_worker() && cache.claim(pc) {
            return self.translator.compile_now(pc);
        }
        if !cache.wait_settled(pc, self.translator.config().worker_poll_interval) {
            self.set_halt(ExitReason::Shutdown);
            return None;
        }
        cache.peek(pc)
    }

    /// Dispatch until the current function returns or execution
    /// halts.
    ///
    /// # Safety
    /// `env` must point at the live `CpuState` of this thread.
    unsafe fn dispatch(&self, env: *mut u8) -> Leave {
        loop {
            if self.poll() {
                return Leave::Halted;
            }
            self.bump(|s| s.dispatches += 1);
            let pc = (*(env as *const CpuState)).pc as u32;

            // Finding a unit may compile it, which can pause the session.
            let found = self.find(pc);
            if self.halted() || self.paused() {
                return Leave::Halted;
            }
            match found {
                Some(entry) => {
                    self.bump(|s| s.compiled_executions += 1);
                    trace!(pc = format_args!("{pc:#010x}"), "enter unit");
                    match entry.code.call(env, self) {
                        EXIT_RETURN => return Leave::Returned,
                        EXIT_HALT => return Leave::Halted,
                        _ => {}
                    }
                }
                None => {
                    if let Some(leave) = self.interpret(env) {
                        return leave;
                    }
                }
            }
        }
    }

    /// Interpret the instruction at `pc`.
    ///
    /// # Safety
    /// Same contract as [`CpuThread::dispatch`].
    unsafe fn interpret(&self, env: *mut u8) -> Option<Leave> {
        self.bump(|s| s.interpreted_steps += 1);
        let mem = self.translator.memory();
        let (status, pc) = {
            let cpu = &mut *(env as *mut CpuState);
            let pc = cpu.pc as u32;
            (interp::step(cpu, mem), pc)
        };
        match status {
            Status::Continue | Status::Branch => None,
            Status::Call => match self.call_nested(env) {
                Leave::Returned => None,
                Leave::Halted => Some(Leave::Halted),
            },
            Status::Return => Some(Leave::Returned),
            Status::Syscall => {
                if self.system_call(env) {
                    None
                } else {
                    Some(Leave::Halted)
                }
            }
            Status::Trap => {
                self.stop(StopReason::Trap { pc });
                Some(Leave::Halted)
            }
            Status::Illegal => {
                self.stop(StopReason::Illegal {
                    pc,
                    word: mem.fetch32(pc),
                });
                Some(Leave::Halted)
            }
        }
    }

    /// Run the function at the current `pc` until it returns.
    ///
    /// # Safety
    /// Same contract as [`CpuThread::dispatch`].
    unsafe fn call_nested(&self, env: *mut u8) -> Leave {
        let depth = self.depth.get();
        if depth >= self.translator.config().max_call_depth {
            self.set_halt(ExitReason::CallDepthExceeded { depth });
            return Leave::Halted;
        }
        self.depth.set(depth + 1);
        let leave = self.dispatch(env);
        self.depth.set(depth);
        leave
    }
}

impl Runtime for CpuThread {
    fn memory(&self) -> &dyn GuestMemory {
        self.translator.memory()
    }

    unsafe fn call_block(&self, env: *mut u8, addr: u32) -> u32 {
        self.bump(|s| s.block_calls += 1);
        (*(env as *mut CpuState)).pc = addr as u64;
        match self.call_nested(env) {
            Leave::Returned => EXIT_RETURN,
            Leave::Halted => EXIT_HALT,
        }
    }

    unsafe fn system_call(&self, env: *mut u8) -> bool {
        let cpu = &mut *(env as *mut CpuState);
        let action = self
            .syscalls
            .borrow_mut()
            .syscall(cpu, self.translator.memory());
        match action {
            SyscallAction::Continue => true,
            SyscallAction::Exit(code) => {
                self.stop(StopReason::Exit { code });
                false
            }
        }
    }

    fn stop(&self, reason: StopReason) {
        debug!(?reason, "stop requested");
        self.set_halt(ExitReason::Stopped(reason));
    }

    fn observe_call_target(&self, site: u32, target: u32) {
        self.translator.profile().observe(site, target);
    }

    fn note_fallback(&self, class: u32) {
        self.translator
            .fallback_stats()
            .note_executed(InsnClass::from_index(class as usize));
    }
}
