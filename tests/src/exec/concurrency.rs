//! Several guest threads sharing one translator and its worker.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use ppujit_core::StopReason;
use ppujit_decode::encode;
use ppujit_exec::{BlockCache, CompileMode, CpuThread, ExecConfig, ExitReason, Translator};
use ppujit_guest::CpuState;

use super::{call_then_exit, entry, MAIN};
use crate::support::{ram_with, CODE};

fn config(mode: CompileMode) -> ExecConfig {
    ExecConfig::default()
        .with_compile_mode(mode)
        .with_worker_poll_interval(Duration::from_millis(5))
}

#[test]
fn racing_lookups_compile_once() {
    let ram = ram_with(&[encode::li(3, 1), encode::blr()]);
    let t = Translator::start(config(CompileMode::Synchronous), ram).unwrap();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                loop {
                    if let Some(e) = t.cache().lookup(CODE) {
                        return e;
                    }
                    assert!(t.cache().wait_settled(CODE, Duration::from_millis(5)));
                }
            })
        })
        .collect();
    let entries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(Arc::ptr_eq(&entries[0], &entries[1]));
    assert_eq!(t.compile_count(CODE), 1);
    assert_eq!(t.cache().stats().enqueues, 1);
    t.shutdown();
}

#[test]
fn threads_share_compiled_units() {
    let ram = ram_with(&MAIN);
    call_then_exit(&ram);
    let t = Translator::start(config(CompileMode::Synchronous), ram).unwrap();
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let t = Arc::clone(&t);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let cpu_thread = CpuThread::new(t);
                let mut cpu = CpuState::new();
                cpu.pc = CODE as u64;
                barrier.wait();
                cpu_thread.run(&mut cpu)
            })
        })
        .collect();
    for h in handles {
        assert_eq!(
            h.join().unwrap(),
            ExitReason::Stopped(StopReason::Exit { code: 111 })
        );
    }
    assert_eq!(t.compile_count(CODE), 1);
    assert_eq!(t.compile_count(CODE + 0x104), 1);
    assert_eq!(t.fallback_stats().executed(ppujit_decode::InsnClass::Sc), 4);
}

#[test]
fn async_threads_agree_with_sync_result() {
    let ram = ram_with(&MAIN);
    call_then_exit(&ram);
    let t = Translator::start(config(CompileMode::Asynchronous), ram).unwrap();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                let cpu_thread = CpuThread::new(t);
                let mut results = Vec::new();
                for _ in 0..20 {
                    let mut cpu = CpuState::new();
                    cpu.pc = CODE as u64;
                    results.push(cpu_thread.run(&mut cpu));
                }
                results
            })
        })
        .collect();
    for h in handles {
        for r in h.join().unwrap() {
            assert_eq!(r, ExitReason::Stopped(StopReason::Exit { code: 111 }));
        }
    }
    assert!(t.compile_count(CODE) <= 1);
}

#[test]
fn shutdown_is_idempotent() {
    let t = Translator::start(config(CompileMode::Synchronous), ram_with(&[])).unwrap();
    assert!(t.has_worker());
    t.shutdown();
    t.shutdown();
    assert!(!t.has_worker());
    assert!(t.cache().is_shut_down());
}

#[test]
fn waiting_thread_sees_shutdown() {
    let t = Translator::start(config(CompileMode::Synchronous), ram_with(&[])).unwrap();
    t.shutdown();
    // Queue an address nobody will compile.
    t.cache().request(CODE + 0x40);
    let cpu_thread = CpuThread::new(Arc::clone(&t));
    let mut cpu = CpuState::new();
    cpu.pc = (CODE + 0x40) as u64;
    assert_eq!(cpu_thread.run(&mut cpu), ExitReason::Shutdown);
}

#[test]
fn threads_without_worker_compile_once() {
    for round in 0..50 {
        let ram = ram_with(&MAIN);
        call_then_exit(&ram);
        let t = Translator::without_worker(config(CompileMode::Synchronous), ram);
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let t = Arc::clone(&t);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let cpu_thread = CpuThread::new(t);
                    let mut cpu = CpuState::new();
                    cpu.pc = CODE as u64;
                    barrier.wait();
                    cpu_thread.run(&mut cpu)
                })
            })
            .collect();
        for h in handles {
            assert_eq!(
                h.join().unwrap(),
                ExitReason::Stopped(StopReason::Exit { code: 111 }),
                "round {round}"
            );
        }
        assert_eq!(t.compile_count(CODE), 1, "round {round}");
        assert_eq!(t.compile_count(CODE + 0x104), 1, "round {round}");
    }
}

#[test]
fn publish_racing_invalidation_leaves_nothing_stale() {
    for round in 0..200 {
        let cache = Arc::new(BlockCache::new(1));
        cache.lookup(0x100);
        let e = entry(0x100, 8, cache.next_revision(), cache.epoch());
        let barrier = Arc::new(Barrier::new(2));

        let publisher = {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.publish(e)
            })
        };
        let invalidator = {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.invalidate_range(0x100, 4)
            })
        };
        let published = publisher.join().unwrap();
        let dropped = invalidator.join().unwrap();

        // Either the entry landed first and was swept, or the
        // publish saw the new epoch and was refused.
        assert_eq!(dropped, usize::from(published), "round {round}");
        assert!(cache.peek(0x100).is_none(), "round {round}");
        assert!(!cache.is_pending(0x100), "round {round}");
        assert!(cache.request(0x100), "round {round}");
    }
}
