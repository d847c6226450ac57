//! Whole guest programs through the dispatcher, compiled and
//! interpreted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ppujit_core::StopReason;
use ppujit_decode::encode::*;
use ppujit_decode::fields::spr;
use ppujit_exec::{CompileMode, CpuThread, ExecConfig, ExitReason, Translator};
use ppujit_guest::{CpuState, GuestRam, MmioDevice};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::support::{ram_with, CODE, DATA, RAM_SIZE};

const STACK: u64 = 0x000C_0000;
const FACT: u32 = CODE + 0x100;

/// `fact(r3)`, recursive, with a stack frame per level.
const FACT_BODY: [u32; 16] = [
    cmpi(0, false, 3, 1),
    bt(1, 12),
    li(3, 1),
    blr(),
    mflr(0),
    stwu(1, 1, -32),
    stw(0, 1, 36),
    stw(3, 1, 8),
    addi(3, 3, -1),
    b(-36, false, true),
    lwz(4, 1, 8),
    mullw(3, 3, 4),
    lwz(0, 1, 36),
    mtlr(0),
    addi(1, 1, 32),
    blr(),
];

/// Exit with `fact(10)`.
const FACT_MAIN: [u32; 5] = [li(3, 10), b(0xFC, false, true), li(11, 3), sc(), blr()];

fn fact_image() -> Arc<GuestRam> {
    let ram = ram_with(&FACT_MAIN);
    ram.write_words(FACT, &FACT_BODY).unwrap();
    ram
}

/// Execution setups every program must agree across.
fn setups(ram: &Arc<GuestRam>) -> Vec<(&'static str, Arc<Translator>)> {
    let poll = Duration::from_millis(5);
    let sync = ExecConfig::default()
        .with_compile_mode(CompileMode::Synchronous)
        .with_worker_poll_interval(poll);
    let asynchronous = ExecConfig::default().with_worker_poll_interval(poll);
    vec![
        ("inline", Translator::without_worker(sync.clone(), ram.clone())),
        ("sync worker", Translator::start(sync, ram.clone()).unwrap()),
        ("async worker", Translator::start(asynchronous.clone(), ram.clone()).unwrap()),
        ("interpreted", Translator::without_worker(asynchronous, ram.clone())),
        (
            "unoptimized",
            Translator::without_worker(
                ExecConfig::default()
                    .with_compile_mode(CompileMode::Synchronous)
                    .with_optimize(false),
                ram.clone(),
            ),
        ),
    ]
}

fn run_from(t: &Arc<Translator>, init: impl Fn(&mut CpuState)) -> (ExitReason, CpuState) {
    let thread = CpuThread::new(Arc::clone(t));
    let mut cpu = CpuState::new();
    cpu.pc = CODE as u64;
    init(&mut cpu);
    (thread.run(&mut cpu), cpu)
}

#[test]
fn recursive_factorial() {
    let ram = fact_image();
    for (name, t) in setups(&ram) {
        // Twice: the second run finds whatever the first compiled.
        for _ in 0..2 {
            let (reason, cpu) = run_from(&t, |cpu| cpu.gpr[1] = STACK);
            assert_eq!(
                reason,
                ExitReason::Stopped(StopReason::Exit { code: 3_628_800 }),
                "{name}"
            );
            assert_eq!(cpu.gpr[1], STACK, "{name}: stack not balanced");
        }
    }
}

#[test]
fn factorial_unit_is_one_function() {
    let ram = fact_image();
    let t = Translator::without_worker(ExecConfig::default(), ram);
    let e = t.compile_now(FACT).unwrap();
    assert_eq!(e.instruction_count, 16);
    assert_eq!(e.callees, [FACT]);
    assert!(e.returns);
    assert_eq!(e.fallbacks, 0);
}

/// Sum eight words at r4, then jump to a far block that exits.
fn sum_image() -> Arc<GuestRam> {
    let far = 0x2000;
    let ram = ram_with(&[
        li(3, 0),
        li(5, 8),
        mtctr(5),
        lwz(6, 4, 0),
        add(3, 3, 6),
        addi(4, 4, 4),
        bdnz(-12),
        b(far, false, false),
    ]);
    ram.write_words(CODE + 28 + far as u32, &[li(11, 3), sc(), blr()])
        .unwrap();
    ram.write_words(DATA, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    ram
}

#[test]
fn loop_over_memory_then_far_jump() {
    let ram = sum_image();
    for (name, t) in setups(&ram) {
        let (reason, cpu) = run_from(&t, |cpu| cpu.gpr[4] = DATA as u64);
        assert_eq!(reason, ExitReason::Stopped(StopReason::Exit { code: 36 }), "{name}");
        assert_eq!(cpu.gpr[4], DATA as u64 + 32, "{name}");
        assert_eq!(cpu.ctr, 0, "{name}");
    }
}

#[test]
fn spr_round_trip_program() {
    let ram = ram_with(&[
        li(3, 0x77),
        mtspr(spr::SPRG3, 3),
        li(3, 0),
        mfspr(5, spr::SPRG3),
        mtspr(spr::XER, 5),
        mfspr(3, spr::XER),
        li(11, 3),
        sc(),
        blr(),
    ]);
    for (name, t) in setups(&ram) {
        let (reason, cpu) = run_from(&t, |_| {});
        assert_eq!(reason, ExitReason::Stopped(StopReason::Exit { code: 0x77 }), "{name}");
        assert_eq!(cpu.sprg[3], 0x77, "{name}");
    }
}

#[derive(Default)]
struct Latch {
    writes: Mutex<Vec<(u32, u32, u64)>>,
}

impl MmioDevice for Latch {
    fn read(&self, _addr: u32, _size: u32) -> u64 {
        41
    }

    fn write(&self, addr: u32, size: u32, val: u64) {
        self.writes.lock().unwrap().push((addr, size, val));
    }
}

#[test]
fn device_program() {
    let dev = Arc::new(Latch::default());
    let ram = GuestRam::new(RAM_SIZE).unwrap().with_device(dev.clone());
    ram.write_words(
        CODE,
        &[lwz(3, 4, 0), addi(3, 3, 1), stw(3, 4, 4), li(11, 3), sc(), blr()],
    )
    .unwrap();
    let ram = Arc::new(ram);
    let mut runs = 0;
    for (name, t) in setups(&ram) {
        let (reason, _) = run_from(&t, |cpu| cpu.gpr[4] = 0xE000_0000);
        assert_eq!(reason, ExitReason::Stopped(StopReason::Exit { code: 42 }), "{name}");
        runs += 1;
    }
    let writes = dev.writes.lock().unwrap();
    assert_eq!(writes.len(), runs);
    assert!(writes.iter().all(|&w| w == (0xE000_0004, 4, 42)));
}

#[test]
fn seeded_operands_agree_across_setups() {
    let ram = ram_with(&[
        add(3, 5, 6),
        subf(7, 6, 3),
        mullw(8, 5, 6),
        li(11, 3),
        sc(),
        blr(),
    ]);
    let setups = setups(&ram);
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED);
    for _ in 0..16 {
        let (a, b): (u64, u64) = (rng.gen(), rng.gen());
        let sum = a.wrapping_add(b);
        let product = (a as i32 as i64).wrapping_mul(b as i32 as i64) as u64;
        for (name, t) in &setups {
            let (reason, cpu) = run_from(t, |cpu| {
                cpu.gpr[5] = a;
                cpu.gpr[6] = b;
            });
            let ctx = format!("{name}: a={a:#x} b={b:#x}");
            assert_eq!(
                reason,
                ExitReason::Stopped(StopReason::Exit { code: sum as i64 }),
                "{ctx}"
            );
            assert_eq!(cpu.gpr[7], a, "{ctx}");
            assert_eq!(cpu.gpr[8], product, "{ctx}");
        }
    }
}
