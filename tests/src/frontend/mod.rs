//! Lowering of guest code into runnable units.

use std::sync::{Arc, Mutex};

use ppujit_backend::ThreadedCodeGen;
use ppujit_core::{Context, StopReason, EXIT_BLOCK_ENDED, EXIT_HALT, EXIT_RETURN};
use ppujit_decode::class::InsnClass;
use ppujit_decode::encode::{self, x_form};
use ppujit_frontend::{
    translate_block, CallSiteProfile, CompileDiagnostics, LowerConfig,
};
use ppujit_guest::{CpuState, GuestRam, MmioDevice};

use crate::support::{compile, lower, ram_with, run_words, TestRuntime, CODE, DATA, RAM_SIZE};

#[derive(Default)]
struct Collect {
    errors: Mutex<Vec<(u32, String)>>,
    unknown: Mutex<Vec<(u32, u32)>>,
}

impl CompileDiagnostics for Collect {
    fn compilation_error(&self, addr: u32, msg: &str) {
        self.errors.lock().unwrap().push((addr, msg.to_string()));
    }

    fn unknown_instruction(&self, addr: u32, word: u32) {
        self.unknown.lock().unwrap().push((addr, word));
    }
}

/// Lower with `diag`, then run once.
fn run_with_diag(words: &[u32], cpu: &mut CpuState, diag: &Collect) -> (u32, TestRuntime) {
    let ram = ram_with(words);
    let mut ir = Context::new();
    translate_block(&mut ir, ram.as_ref(), CODE, &LowerConfig::default(), diag, None);
    let code = ppujit_backend::translate(&mut ir, &ThreadedCodeGen::new(), true).unwrap();
    let rt = TestRuntime::new(ram);
    cpu.pc = CODE as u64;
    let exit = unsafe { code.call(cpu.as_env_ptr(), &rt) };
    (exit, rt)
}

#[test]
fn add_then_return() {
    let mut cpu = CpuState::new();
    cpu.gpr[1] = 5;
    cpu.gpr[2] = 7;
    cpu.lr = 0x0002_0000;
    let (exit, _) = run_words(&[encode::add(3, 1, 2), encode::blr()], &mut cpu);
    assert_eq!(exit, EXIT_RETURN);
    assert_eq!(cpu.gpr[3], 12);
    assert_eq!(cpu.pc, 0x0002_0000);
}

#[test]
fn unit_metadata() {
    let ram = ram_with(&[encode::add(3, 1, 2), encode::blr(), encode::nop()]);
    let (tb, code) = compile(&ram, CODE);
    assert!(!code.is_empty());
    assert_eq!(tb.tb.pc, CODE);
    assert_eq!(tb.tb.icount, 2);
    assert_eq!(tb.tb.size, 8);
    assert_eq!(tb.nesting, 1);
    assert!(tb.info.returns);
    assert_eq!(tb.info.terminator, Some(InsnClass::Bclr));
    assert!(tb.fallbacks.is_empty());
}

#[test]
fn every_lowered_unit_is_balanced() {
    let programs: [&[u32]; 4] = [
        &[encode::blr()],
        &[encode::cmpi(0, false, 3, 0), encode::bt(2, 8), encode::li(4, 1), encode::blr()],
        &[encode::mtctr(4), encode::addi(3, 3, 1), encode::bdnz(-4), encode::blr()],
        &[encode::b(0x4000, false, false)],
    ];
    for words in programs {
        let ram = ram_with(words);
        let mut ir = Context::new();
        let tb = lower(&mut ir, &ram, CODE);
        assert_eq!(tb.nesting, 1, "{words:x?}");
    }
}

#[test]
fn forward_conditional_skips() {
    let words = [
        encode::cmpi(0, false, 3, 0),
        // beq +8: skip the next instruction.
        encode::bt(2, 8),
        encode::addi(4, 4, 1),
        encode::addi(5, 5, 1),
        encode::blr(),
    ];
    for (r3, want_r4) in [(0u64, 0u64), (1, 1)] {
        let mut cpu = CpuState::new();
        cpu.gpr[3] = r3;
        let (exit, _) = run_words(&words, &mut cpu);
        assert_eq!(exit, EXIT_RETURN);
        assert_eq!(cpu.gpr[4], want_r4);
        assert_eq!(cpu.gpr[5], 1);
    }
}

#[test]
fn if_else_joins_after_both_arms() {
    let words = [
        encode::cmpi(0, false, 3, 0),
        // bne +12: take the else arm.
        encode::bf(2, 12),
        encode::li(4, 1),
        // b +8: skip the else arm.
        encode::b(8, false, false),
        encode::li(4, 2),
        encode::blr(),
    ];
    let ram = ram_with(&words);
    let mut ir = Context::new();
    let tb = lower(&mut ir, &ram, CODE);
    assert_eq!(tb.nesting, 1);
    assert_eq!(tb.tb.icount, 6);
    assert!(tb.info.returns);

    for (r3, want_r4) in [(0u64, 1u64), (5, 2)] {
        let mut cpu = CpuState::new();
        cpu.gpr[3] = r3;
        cpu.lr = 0x0002_0000;
        let (exit, rt) = run_words(&words, &mut cpu);
        assert_eq!(exit, EXIT_RETURN, "r3 = {r3}");
        assert_eq!(cpu.gpr[4], want_r4, "r3 = {r3}");
        assert_eq!(cpu.pc, 0x0002_0000);
        assert!(rt.calls.borrow().is_empty());
    }
}

#[test]
fn counted_loop_stays_in_unit() {
    let words = [
        encode::li(4, 5),
        encode::mtctr(4),
        encode::li(3, 0),
        encode::addi(3, 3, 2),
        encode::bdnz(-4),
        encode::blr(),
    ];
    let mut cpu = CpuState::new();
    let (exit, rt) = run_words(&words, &mut cpu);
    assert_eq!(exit, EXIT_RETURN);
    assert_eq!(cpu.gpr[3], 10);
    assert_eq!(cpu.ctr, 0);
    assert!(rt.calls.borrow().is_empty());
}

#[test]
fn far_branch_leaves_unit() {
    let mut cpu = CpuState::new();
    let (exit, _) = run_words(&[encode::b(0x4000, false, false)], &mut cpu);
    assert_eq!(exit, EXIT_BLOCK_ENDED);
    assert_eq!(cpu.pc, CODE as u64 + 0x4000);
}

#[test]
fn untaken_far_branch_falls_through() {
    let words = [
        encode::cmpi(0, false, 3, 0),
        encode::bt(2, 0x2000),
        encode::li(5, 1),
        encode::blr(),
    ];
    let mut cpu = CpuState::new();
    cpu.gpr[3] = 1;
    cpu.lr = 0x100;
    let (exit, _) = run_words(&words, &mut cpu);
    assert_eq!(exit, EXIT_RETURN);
    assert_eq!(cpu.gpr[5], 1);

    let mut cpu = CpuState::new();
    let (exit, _) = run_words(&words, &mut cpu);
    assert_eq!(exit, EXIT_BLOCK_ENDED);
    assert_eq!(cpu.pc, CODE as u64 + 4 + 0x2000);
    assert_eq!(cpu.gpr[5], 0);
}

#[test]
fn linked_branch_calls_and_continues() {
    let words = [
        encode::b(0x100, false, true),
        encode::addi(3, 3, 1),
        encode::blr(),
    ];
    let mut cpu = CpuState::new();
    let (exit, rt) = run_words(&words, &mut cpu);
    assert_eq!(*rt.calls.borrow(), [CODE + 0x100]);
    assert_eq!(cpu.gpr[3], 1);
    assert_eq!(cpu.lr, CODE as u64 + 4);
    assert_eq!(exit, EXIT_RETURN);
}

struct OneTarget(u32);

impl CallSiteProfile for OneTarget {
    fn known_targets(&self, _site: u32) -> Vec<u32> {
        vec![self.0]
    }
}

#[test]
fn computed_calls_record_unseen_targets() {
    let words = [encode::bctrl(), encode::blr()];
    let ram = ram_with(&words);
    let known = CODE + 0x200;
    let profile = OneTarget(known);
    let mut ir = Context::new();
    translate_block(
        &mut ir,
        ram.as_ref(),
        CODE,
        &LowerConfig::default(),
        &ppujit_frontend::LogDiagnostics,
        Some(&profile),
    );
    let code = ppujit_backend::translate(&mut ir, &ThreadedCodeGen::new(), true).unwrap();

    for (target, observed) in [(known, false), (CODE + 0x300, true)] {
        let rt = TestRuntime::new(ram.clone());
        let mut cpu = CpuState::new();
        cpu.ctr = target as u64;
        cpu.pc = CODE as u64;
        unsafe { code.call(cpu.as_env_ptr(), &rt) };
        assert_eq!(*rt.calls.borrow(), [target]);
        assert_eq!(!rt.observed.borrow().is_empty(), observed);
        if observed {
            assert_eq!(rt.observed.borrow()[0], (CODE, target));
        }
    }
}

#[test]
fn syscalls_go_through_fallback() {
    let words = [encode::li(11, 3), encode::sc(), encode::li(4, 9), encode::blr()];
    let ram = ram_with(&words);
    let (tb, _) = compile(&ram, CODE);
    assert_eq!(tb.fallbacks, [InsnClass::Sc]);
    assert_eq!(tb.tb.fallbacks, 1);

    let mut cpu = CpuState::new();
    let (exit, rt) = run_words(&words, &mut cpu);
    assert_eq!(exit, EXIT_RETURN);
    assert_eq!(rt.syscalls.get(), 1);
    assert_eq!(cpu.gpr[4], 9);
    assert_eq!(*rt.fallbacks.borrow(), [InsnClass::Sc.index() as u32]);
}

#[test]
fn refused_syscall_halts() {
    let words = [encode::li(11, 22), encode::sc(), encode::li(4, 9), encode::blr()];
    let mut cpu = CpuState::new();
    let (exit, _) = run_words(&words, &mut cpu);
    assert_eq!(exit, EXIT_HALT);
    assert_eq!(cpu.gpr[4], 0);
    assert_eq!(cpu.pc, CODE as u64 + 8);
}

#[test]
fn trap_stops_execution() {
    let tw = x_form(31, 31, 0, 0, 4, false);
    let mut cpu = CpuState::new();
    let (exit, rt) = run_words(&[tw, encode::blr()], &mut cpu);
    assert_eq!(exit, EXIT_HALT);
    assert_eq!(rt.stopped.get(), Some(StopReason::Trap { pc: CODE }));
}

#[test]
fn bcctr_with_decrement_is_a_compilation_error() {
    let word = encode::bcctr(0, 0, false);
    let diag = Collect::default();
    let mut cpu = CpuState::new();
    let (exit, rt) = run_with_diag(&[word], &mut cpu, &diag);
    assert_eq!(exit, EXIT_HALT);
    assert_eq!(diag.errors.lock().unwrap().len(), 1);
    assert_eq!(diag.errors.lock().unwrap()[0].0, CODE);
    assert_eq!(rt.stopped.get(), Some(StopReason::Unsupported { pc: CODE, word }));
}

#[test]
fn unknown_word_is_reported() {
    let diag = Collect::default();
    let mut cpu = CpuState::new();
    let (exit, rt) = run_with_diag(&[encode::li(3, 1), 0], &mut cpu, &diag);
    assert_eq!(exit, EXIT_HALT);
    assert_eq!(cpu.gpr[3], 1);
    assert_eq!(*diag.unknown.lock().unwrap(), [(CODE + 4, 0)]);
    assert_eq!(rt.stopped.get(), Some(StopReason::Illegal { pc: CODE + 4, word: 0 }));
}

#[test]
fn unit_length_is_capped() {
    let words = vec![encode::nop(); 600];
    let ram = ram_with(&words);
    let (tb, _) = compile(&ram, CODE);
    assert_eq!(tb.tb.icount, LowerConfig::default().max_insns);

    let mut cpu = CpuState::new();
    let (exit, _) = run_words(&words, &mut cpu);
    assert_eq!(exit, EXIT_BLOCK_ENDED);
    assert_eq!(cpu.pc, CODE as u64 + 512 * 4);
}

#[test]
fn scalar_memory_is_big_endian() {
    let words = [encode::stw(5, 1, 4), encode::lbz(6, 1, 5), encode::ld(7, 1, 0), encode::blr()];
    let ram = ram_with(&words);
    let (_, code) = compile(&ram, CODE);
    let rt = TestRuntime::new(ram);
    let mut cpu = CpuState::new();
    cpu.gpr[1] = DATA as u64;
    cpu.gpr[5] = 0x1122_3344;
    cpu.pc = CODE as u64;
    unsafe { code.call(cpu.as_env_ptr(), &rt) };
    assert_eq!(rt.mem.snapshot(DATA + 4, 4), [0x11, 0x22, 0x33, 0x44]);
    assert_eq!(cpu.gpr[6], 0x22);
    assert_eq!(cpu.gpr[7], 0x1122_3344);
}

#[derive(Default)]
struct Device {
    writes: Mutex<Vec<(u32, u32, u64)>>,
}

impl MmioDevice for Device {
    fn read(&self, _addr: u32, size: u32) -> u64 {
        match size {
            4 => 0xA1B2_C3D4,
            _ => 0,
        }
    }

    fn write(&self, addr: u32, size: u32, val: u64) {
        self.writes.lock().unwrap().push((addr, size, val));
    }
}

#[test]
fn device_window_accesses_fork_at_run_time() {
    let dev = Arc::new(Device::default());
    let ram = GuestRam::new(RAM_SIZE).unwrap().with_device(dev.clone());
    let words = [encode::lwz(3, 1, 0), encode::stw(5, 1, 8), encode::blr()];
    ram.write_words(CODE, &words).unwrap();
    let ram = Arc::new(ram);
    let (_, code) = compile(&ram, CODE);

    // Same unit, once against RAM and once against the device.
    for (base, from_device) in [(DATA, false), (0xE000_0000, true)] {
        let rt = TestRuntime::new(ram.clone());
        let mut cpu = CpuState::new();
        cpu.gpr[1] = base as u64;
        cpu.gpr[5] = 0x55;
        cpu.pc = CODE as u64;
        unsafe { code.call(cpu.as_env_ptr(), &rt) };
        if from_device {
            assert_eq!(cpu.gpr[3], 0xA1B2_C3D4);
        } else {
            assert_eq!(cpu.gpr[3], 0);
            assert_eq!(rt.mem.snapshot(DATA + 8, 4), [0, 0, 0, 0x55]);
        }
    }
    assert_eq!(*dev.writes.lock().unwrap(), [(0xE000_0008, 4, 0x55)]);
}
