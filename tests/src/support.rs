//! Shared fixtures: guest RAM with code loaded, a recording runtime
//! and a one-call compile helper.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ppujit_backend::{CompiledCode, ThreadedCodeGen};
use ppujit_core::{Context, GuestMemory, Runtime, StopReason, EXIT_RETURN};
use ppujit_frontend::{translate_block, LogDiagnostics, LowerConfig, TranslatedBlock};
use ppujit_guest::{CpuState, GuestRam};

pub const CODE: u32 = 0x0001_0000;
pub const DATA: u32 = 0x0008_0000;
pub const RAM_SIZE: usize = 0x0010_0000;

pub fn ram_with(words: &[u32]) -> Arc<GuestRam> {
    let ram = GuestRam::new(RAM_SIZE).unwrap();
    ram.write_words(CODE, words).unwrap();
    Arc::new(ram)
}

/// Runtime that records what compiled code asked for. A block call
/// behaves like a callee that returns immediately.
pub struct TestRuntime {
    pub mem: Arc<GuestRam>,
    pub calls: RefCell<Vec<u32>>,
    pub syscalls: Cell<u32>,
    pub stopped: Cell<Option<StopReason>>,
    pub observed: RefCell<Vec<(u32, u32)>>,
    pub fallbacks: RefCell<Vec<u32>>,
}

impl TestRuntime {
    pub fn new(mem: Arc<GuestRam>) -> Self {
        Self {
            mem,
            calls: RefCell::new(Vec::new()),
            syscalls: Cell::new(0),
            stopped: Cell::new(None),
            observed: RefCell::new(Vec::new()),
            fallbacks: RefCell::new(Vec::new()),
        }
    }
}

impl Runtime for TestRuntime {
    fn memory(&self) -> &dyn GuestMemory {
        self.mem.as_ref()
    }

    unsafe fn call_block(&self, env: *mut u8, addr: u32) -> u32 {
        self.calls.borrow_mut().push(addr);
        let cpu = &mut *(env as *mut CpuState);
        cpu.pc = cpu.lr & !3;
        EXIT_RETURN
    }

    unsafe fn system_call(&self, env: *mut u8) -> bool {
        self.syscalls.set(self.syscalls.get() + 1);
        let cpu = &*(env as *const CpuState);
        cpu.gpr[11] != 22
    }

    fn stop(&self, reason: StopReason) {
        self.stopped.set(Some(reason));
    }

    fn observe_call_target(&self, site: u32, target: u32) {
        self.observed.borrow_mut().push((site, target));
    }

    fn note_fallback(&self, class: u32) {
        self.fallbacks.borrow_mut().push(class);
    }
}

pub fn lower(ir: &mut Context, mem: &GuestRam, pc: u32) -> TranslatedBlock {
    translate_block(ir, mem, pc, &LowerConfig::default(), &LogDiagnostics, None)
}

/// Lower and generate the unit at `pc`.
pub fn compile(mem: &GuestRam, pc: u32) -> (TranslatedBlock, CompiledCode) {
    let mut ir = Context::new();
    let tb = lower(&mut ir, mem, pc);
    let code = ppujit_backend::translate(&mut ir, &ThreadedCodeGen::new(), true).unwrap();
    (tb, code)
}

/// Compile `words` at [`CODE`] and run them once from `cpu`.
pub fn run_words(words: &[u32], cpu: &mut CpuState) -> (u32, TestRuntime) {
    let ram = ram_with(words);
    let (_, code) = compile(&ram, CODE);
    let rt = TestRuntime::new(ram);
    cpu.pc = CODE as u64;
    let exit = unsafe { code.call(cpu.as_env_ptr(), &rt) };
    (exit, rt)
}
