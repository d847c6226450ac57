//! Block cache, translator and dispatcher.

mod concurrency;

use std::sync::Arc;

use ppujit_core::{GuestMemory, StopReason};
use ppujit_decode::class::InsnClass;
use ppujit_decode::encode;
use ppujit_exec::{
    BlockCache, CompileMode, CompiledEntry, CpuThread, ExecConfig, ExitReason, SyscallAction,
    SyscallHandler, Translator, CELL_ENOSYS,
};
use ppujit_frontend::CallSiteProfile;
use ppujit_guest::{CpuState, GuestRam};

use crate::support::{compile, ram_with, CODE};

/// A published-ready entry for `addr` covering `size` bytes.
fn entry(addr: u32, size: u32, revision: u64, epoch: u64) -> CompiledEntry {
    let ram = ram_with(&[encode::blr()]);
    let (_, code) = compile(&ram, CODE);
    CompiledEntry {
        address: addr,
        revision,
        epoch,
        code,
        size,
        instruction_count: size / 4,
        fallbacks: 0,
        callees: Vec::new(),
        has_indirect: false,
        returns: true,
    }
}

fn sync_config() -> ExecConfig {
    ExecConfig::default().with_compile_mode(CompileMode::Synchronous)
}

fn translator(ram: Arc<GuestRam>, cfg: ExecConfig) -> Arc<Translator> {
    Translator::without_worker(cfg, ram)
}

fn run(words: &[u32], cfg: ExecConfig) -> (ExitReason, CpuState, CpuThread) {
    let ram = ram_with(words);
    let thread = CpuThread::new(translator(ram, cfg));
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    let reason = thread.run(&mut cpu);
    (reason, cpu, thread)
}

// -- Block cache --

#[test]
fn miss_queues_once() {
    let cache = BlockCache::new(1);
    assert!(cache.lookup(0x100).is_none());
    assert!(cache.is_pending(0x100));
    assert!(cache.lookup(0x100).is_none());
    assert!(!cache.request(0x100));
    assert_eq!(cache.pending_len(), 1);
    let st = cache.stats();
    assert_eq!((st.misses, st.enqueues), (2, 1));
}

#[test]
fn hotness_threshold_delays_queueing() {
    let cache = BlockCache::new(3);
    cache.lookup(0x100);
    cache.lookup(0x100);
    assert!(!cache.is_pending(0x100));
    cache.lookup(0x100);
    assert!(cache.is_pending(0x100));
    // An explicit request skips the count.
    assert!(cache.request(0x200));
}

#[test]
fn publish_shares_one_entry() {
    let cache = BlockCache::new(1);
    cache.lookup(0x100);
    let rev = cache.next_revision();
    assert!(cache.publish(entry(0x100, 8, rev, cache.epoch())));
    assert!(!cache.is_pending(0x100));
    let a = cache.lookup(0x100).unwrap();
    let b = cache.lookup(0x100).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.revision, rev);
    assert_eq!(cache.stats().hits, 2);
    // A live address is never queued again.
    assert!(!cache.request(0x100));
}

#[test]
fn stale_epoch_publish_is_dropped() {
    let cache = BlockCache::new(1);
    cache.lookup(0x100);
    let e = entry(0x100, 8, cache.next_revision(), cache.epoch());
    cache.invalidate_range(0x100, 4);
    assert!(!cache.publish(e));
    assert!(cache.peek(0x100).is_none());
    assert!(!cache.is_pending(0x100));
    // The address can be compiled again.
    assert!(cache.request(0x100));
}

#[test]
fn revision_gating() {
    let cache = BlockCache::new(1);
    for addr in [0x100, 0x200, 0x300] {
        let rev = cache.next_revision();
        cache.publish(entry(addr, 8, rev, cache.epoch()));
    }
    assert_eq!(cache.current_revision(), 3);
    assert_eq!(cache.invalidate_revision_older_than(3), 2);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.peek(0x300).unwrap().revision, 3);
    assert_eq!(cache.invalidate_revision_older_than(3), 0);
    assert_eq!(cache.invalidate_all(), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().invalidations, 3);
}

#[test]
fn range_invalidation_hits_overlapping_units() {
    let cache = BlockCache::new(1);
    cache.publish(entry(0x100, 0x20, cache.next_revision(), cache.epoch()));
    cache.publish(entry(0x200, 0x20, cache.next_revision(), cache.epoch()));
    let epoch = cache.epoch();
    assert_eq!(cache.invalidate_range(0x11C, 8), 1);
    assert!(cache.epoch() > epoch);
    assert!(cache.peek(0x100).is_none());
    assert!(cache.peek(0x200).is_some());
    assert_eq!(cache.invalidate_range(0x400, 0x100), 0);
}

#[test]
fn failed_addresses_stay_interpreted() {
    let cache = BlockCache::new(1);
    cache.lookup(0x100);
    assert!(cache.fail(0x100));
    assert!(!cache.fail(0x100));
    assert!(cache.has_failed(0x100));
    assert!(cache.lookup(0x100).is_none());
    assert!(!cache.is_pending(0x100));
    assert!(!cache.request(0x100));
}

#[test]
fn shutdown_releases_worker() {
    let cache = BlockCache::new(1);
    cache.shutdown();
    assert!(cache.wait_for_work(std::time::Duration::from_millis(1)).is_none());
}

#[test]
fn claim_hands_an_address_to_one_caller() {
    let cache = BlockCache::new(1);
    assert!(cache.claim(0x100));
    assert!(cache.is_pending(0x100));
    assert!(!cache.claim(0x100));
    assert!(cache.lookup(0x100).is_none());

    // A queued address is taken off the queue by its claimer.
    cache.lookup(0x200);
    assert!(cache.claim(0x200));
    assert!(!cache.claim(0x200));
    cache.request(0x300);
    let drained = cache.wait_for_work(std::time::Duration::from_millis(1));
    assert_eq!(drained, Some(vec![0x300]));

    assert!(cache.publish(entry(0x100, 8, cache.next_revision(), cache.epoch())));
    assert!(!cache.claim(0x100));
    assert!(cache.fail(0x200));
    assert!(!cache.claim(0x200));
}

#[test]
fn invalidated_address_can_be_queued_again() {
    let cache = BlockCache::new(1);
    cache.lookup(0x100);
    assert!(cache.publish(entry(0x100, 8, cache.next_revision(), cache.epoch())));
    assert_eq!(cache.invalidate_range(0x104, 4), 1);
    assert!(cache.peek(0x100).is_none());
    assert!(cache.lookup(0x100).is_none());
    assert!(cache.is_pending(0x100));
    assert!(cache.claim(0x100));
}

// -- Translator --

#[test]
fn compile_now_publishes() {
    let ram = ram_with(&[encode::li(3, 1), encode::blr()]);
    let t = translator(ram, sync_config());
    let e = t.compile_now(CODE).unwrap();
    assert_eq!(e.address, CODE);
    assert_eq!(e.instruction_count, 2);
    assert_eq!(e.size, 8);
    assert!(e.returns);
    assert_eq!(t.compile_count(CODE), 1);
    assert!(Arc::ptr_eq(&e, &t.cache().peek(CODE).unwrap()));
}

#[test]
fn misaligned_address_fails() {
    let t = translator(ram_with(&[]), sync_config());
    assert!(t.compile_now(CODE + 2).is_none());
    assert!(t.cache().has_failed(CODE + 2));
}

#[test]
fn prefetch_queues_callees() {
    let ram = ram_with(&[encode::b(0x40, false, true), encode::blr()]);
    let t = translator(ram, sync_config().with_prefetch_callees(true));
    let e = t.compile_now(CODE).unwrap();
    assert_eq!(e.callees, [CODE + 0x40]);
    assert!(t.cache().is_pending(CODE + 0x40));
}

// -- Dispatcher --

#[test]
fn returns_from_outermost_function() {
    let mut cpu = CpuState::new();
    cpu.gpr[1] = 5;
    cpu.gpr[2] = 7;
    cpu.lr = 0x0004_0000;
    cpu.pc = CODE as u64;
    let ram = ram_with(&[encode::add(3, 1, 2), encode::blr()]);
    let thread = CpuThread::new(translator(ram, sync_config()));
    assert_eq!(thread.run(&mut cpu), ExitReason::Returned);
    assert_eq!(cpu.gpr[3], 12);
    assert_eq!(cpu.pc, 0x0004_0000);
    let st = thread.stats();
    assert_eq!(st.compiled_executions, 1);
    assert_eq!(st.interpreted_steps, 0);
}

#[test]
fn async_mode_interprets_until_compiled() {
    // No worker: nothing is ever compiled.
    let (reason, cpu, thread) = run(&[encode::li(3, 4), encode::blr()], ExecConfig::default());
    assert_eq!(reason, ExitReason::Returned);
    assert_eq!(cpu.gpr[3], 4);
    assert_eq!(thread.stats().interpreted_steps, 2);
    assert_eq!(thread.stats().compiled_executions, 0);
    assert!(thread.translator().cache().is_pending(CODE));
}

/// `main` calls a function at +0x104, then exits with r3.
fn call_then_exit(ram: &GuestRam) {
    ram.write_words(CODE + 0x104, &[encode::addi(3, 3, 100), encode::blr()])
        .unwrap();
}

const MAIN: [u32; 6] = [
    encode::li(3, 1),
    encode::b(0x100, false, true),
    encode::addi(3, 3, 10),
    encode::li(11, 3),
    encode::sc(),
    encode::blr(),
];

#[test]
fn nested_calls_and_exit_syscall() {
    let ram = ram_with(&MAIN);
    call_then_exit(&ram);
    let thread = CpuThread::new(translator(ram, sync_config()));
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    let reason = thread.run(&mut cpu);
    assert_eq!(reason, ExitReason::Stopped(StopReason::Exit { code: 111 }));
    assert_eq!(thread.stats().block_calls, 1);
    let fb = thread.translator().fallback_stats();
    assert_eq!(fb.emitted(InsnClass::Sc), 1);
    assert_eq!(fb.executed(InsnClass::Sc), 1);
    assert_eq!(fb.report()[0].class, InsnClass::Sc);
}

#[test]
fn interpreter_follows_calls_too() {
    let ram = ram_with(&MAIN);
    call_then_exit(&ram);
    let thread = CpuThread::new(translator(ram, ExecConfig::default()));
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    let reason = thread.run(&mut cpu);
    assert_eq!(reason, ExitReason::Stopped(StopReason::Exit { code: 111 }));
    assert_eq!(thread.stats().compiled_executions, 0);
}

#[test]
fn unknown_syscall_returns_enosys() {
    let words = [
        encode::li(11, 99),
        encode::sc(),
        encode::li(11, 22),
        encode::sc(),
        encode::blr(),
    ];
    let (reason, _, _) = run(&words, sync_config());
    assert_eq!(
        reason,
        ExitReason::Stopped(StopReason::Exit { code: CELL_ENOSYS as i64 })
    );
}

struct CountingSyscalls(u32);

impl SyscallHandler for CountingSyscalls {
    fn syscall(&mut self, cpu: &mut CpuState, _mem: &dyn GuestMemory) -> SyscallAction {
        self.0 += 1;
        if self.0 == 3 {
            SyscallAction::Exit(cpu.gpr[3] as i64)
        } else {
            cpu.gpr[3] += 1;
            SyscallAction::Continue
        }
    }
}

#[test]
fn custom_syscall_handler() {
    let words = [encode::sc(), encode::sc(), encode::sc(), encode::blr()];
    let ram = ram_with(&words);
    let thread = CpuThread::with_syscalls(
        translator(ram, sync_config()),
        Box::new(CountingSyscalls(0)),
    );
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    assert_eq!(
        thread.run(&mut cpu),
        ExitReason::Stopped(StopReason::Exit { code: 2 })
    );
}

#[test]
fn compile_diagnostic_pauses_session() {
    let (reason, cpu, thread) = run(&[encode::li(3, 1), 0], sync_config());
    assert_eq!(reason, ExitReason::Paused);
    // The unit never ran.
    assert_eq!(cpu.gpr[3], 0);
    let diag = thread.translator().diagnostics();
    assert_eq!(diag.unknown_instructions(), 1);
    assert_eq!(diag.compilation_errors(), 0);

    diag.resume();
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    let reason = thread.run(&mut cpu);
    assert_eq!(
        reason,
        ExitReason::Stopped(StopReason::Illegal { pc: CODE + 4, word: 0 })
    );
    assert_eq!(cpu.gpr[3], 1);
}

#[test]
fn call_depth_is_bounded() {
    // Unconditional self-recursion.
    let words = [encode::b(0, false, true), encode::blr()];
    let (reason, _, _) = run(&words, sync_config().with_max_call_depth(8));
    assert_eq!(reason, ExitReason::CallDepthExceeded { depth: 8 });
}

#[test]
fn dispatch_budget() {
    let ram = ram_with(&[encode::b(0x1000, false, false)]);
    ram.write_words(CODE + 0x1000, &[encode::b(-0x1000, false, false)])
        .unwrap();
    let cfg = sync_config().with_max_dispatches(Some(10));
    let thread = CpuThread::new(translator(ram, cfg));
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    assert_eq!(thread.run(&mut cpu), ExitReason::BudgetExhausted);
    assert_eq!(thread.stats().dispatches, 10);
}

#[test]
fn rewritten_code_is_recompiled() {
    let ram = ram_with(&[encode::li(3, 1), encode::blr()]);
    let thread = CpuThread::new(translator(ram.clone(), sync_config()));
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    thread.run(&mut cpu);
    assert_eq!(cpu.gpr[3], 1);

    ram.write_words(CODE, &[encode::li(3, 2)]).unwrap();
    assert_eq!(thread.translator().invalidate_range(CODE, 4), 1);
    cpu.pc = CODE as u64;
    thread.run(&mut cpu);
    assert_eq!(cpu.gpr[3], 2);
    assert_eq!(thread.translator().compile_count(CODE), 2);

    ram.write_words(CODE, &[encode::li(3, 3)]).unwrap();
    thread.translator().invalidate_all();
    cpu.pc = CODE as u64;
    thread.run(&mut cpu);
    assert_eq!(cpu.gpr[3], 3);
}

#[test]
fn computed_call_targets_are_profiled() {
    let words = [
        encode::mtctr(4),
        encode::bctrl(),
        encode::li(11, 3),
        encode::sc(),
        encode::blr(),
    ];
    let ram = ram_with(&words);
    ram.write_words(CODE + 0x200, &[encode::blr()]).unwrap();
    let thread = CpuThread::new(translator(ram, sync_config()));
    let mut cpu = CpuState::new();
    cpu.gpr[4] = (CODE + 0x200) as u64;
    cpu.pc = CODE as u64;
    let reason = thread.run(&mut cpu);
    assert!(matches!(reason, ExitReason::Stopped(StopReason::Exit { .. })));
    let profile = thread.translator().profile();
    assert_eq!(profile.known_targets(CODE + 4), [CODE + 0x200]);
    assert_eq!(profile.num_sites(), 1);
}
