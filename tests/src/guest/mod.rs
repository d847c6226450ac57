//! Register file, guest memory and reference interpreter.

use std::sync::{Arc, Mutex};

use ppujit_core::GuestMemory;
use ppujit_decode::encode::{self, x_form, xo_form};
use ppujit_decode::fields::spr;
use ppujit_decode::{decode, InsnClass};
use ppujit_guest::cpu::{crbits, xer};
use ppujit_guest::interp::{rotate_mask, rotl32_dup};
use ppujit_guest::{execute, step, CpuState, GuestRam, LoadError, MmioDevice, Status};

use crate::support::{ram_with, CODE, DATA, RAM_SIZE};

fn run_one(word: u32, cpu: &mut CpuState) -> Status {
    let ram = ram_with(&[word]);
    cpu.pc = CODE as u64;
    step(cpu, ram.as_ref())
}

// -- CpuState --

#[test]
fn cr_fields_and_bits() {
    let mut cpu = CpuState::new();
    cpu.set_cr_field(0, crbits::LT);
    cpu.set_cr_field(7, crbits::EQ | crbits::SO);
    assert_eq!(cpu.cr, 0x8000_0003);
    assert_eq!(cpu.cr_field(0), crbits::LT);
    assert!(cpu.cr_bit(0));
    assert!(cpu.cr_bit(31));
    assert!(!cpu.cr_bit(1));
    cpu.set_cr_bit(1, true);
    assert_eq!(cpu.cr_field(0), crbits::LT | crbits::GT);
}

#[test]
fn overflow_is_sticky() {
    let mut cpu = CpuState::new();
    cpu.set_ov(true);
    assert!(cpu.so());
    cpu.set_ov(false);
    assert_eq!(cpu.xer & xer::OV, 0);
    assert!(cpu.so());
}

#[test]
fn cr0_copies_summary_overflow() {
    let mut cpu = CpuState::new();
    cpu.xer = xer::SO;
    cpu.set_cr0(0);
    assert_eq!(cpu.cr_field(0), crbits::EQ | crbits::SO);
    cpu.set_cr0(u64::MAX);
    assert_eq!(cpu.cr_field(0), crbits::LT | crbits::SO);
}

#[test]
fn diff_names_changed_fields() {
    let a = CpuState::new();
    let mut b = a.clone();
    b.gpr[5] = 1;
    b.ctr = 9;
    b.sprg[2] = 3;
    let d = a.diff(&b);
    assert_eq!(d.len(), 3);
    assert!(d[0].starts_with("r5:"));
    assert!(d.iter().any(|l| l.starts_with("ctr:")));
    assert!(d.iter().any(|l| l.starts_with("sprg2:")));
    assert!(a.diff(&a.clone()).is_empty());
}

// -- Bit helpers --

#[test]
fn rotate_masks() {
    assert_eq!(rotate_mask(0, 63), u64::MAX);
    assert_eq!(rotate_mask(32, 63), 0xFFFF_FFFF);
    assert_eq!(rotate_mask(0, 0), 1 << 63);
    assert_eq!(rotate_mask(63, 63), 1);
    // Wrapping mask: bits 60..63 and 0..3.
    assert_eq!(rotate_mask(60, 3), 0xF000_0000_0000_000F);
}

#[test]
fn rotate_duplicates_low_word() {
    assert_eq!(rotl32_dup(0x8000_0001, 1), 0x0000_0003_0000_0003);
    assert_eq!(rotl32_dup(0xFFFF_FFFF_1234_5678, 0), 0x1234_5678_1234_5678);
}

// -- Memory --

#[test]
fn ram_is_big_endian() {
    let ram = GuestRam::new(RAM_SIZE).unwrap();
    ram.write(DATA, 4, 0x1122_3344);
    assert_eq!(ram.snapshot(DATA, 4), [0x11, 0x22, 0x33, 0x44]);
    assert_eq!(ram.read(DATA, 2), 0x1122);
    assert_eq!(ram.read(DATA + 3, 1), 0x44);
    ram.write_u128(DATA + 0x10, 1);
    assert_eq!(ram.snapshot(DATA + 0x10, 16)[15], 1);
    assert_eq!(ram.read_u128(DATA + 0x10), 1);
}

#[test]
fn unmapped_reads_are_zero() {
    let ram = GuestRam::new(0x1000).unwrap();
    assert_eq!(ram.read(0x8000, 4), 0);
    ram.write(0x8000, 4, 0xFFFF_FFFF);
    assert_eq!(ram.read(0x8000, 4), 0);
    ram.write(0xFFE, 2, 0xABCD);
    assert_eq!(ram.snapshot(0xFFE, 4), [0xAB, 0xCD, 0, 0]);
}

#[test]
fn write_straddling_the_end_is_truncated() {
    let ram = GuestRam::new(0x1000).unwrap();
    ram.write(0xFFE, 4, 0x1122_3344);
    // The mapped half lands, the rest is discarded.
    assert_eq!(ram.snapshot(0xFFC, 4), [0, 0, 0x11, 0x22]);
    assert_eq!(ram.read(0xFFE, 2), 0x1122);
    assert_eq!(ram.read(0xFFE, 4), 0x1122_0000);
}

#[test]
fn image_past_end_is_rejected() {
    let ram = GuestRam::new(0x1000).unwrap();
    let err = ram.load_image(0xFF0, &[0; 32]).unwrap_err();
    assert!(matches!(err, LoadError::OutOfRange { addr: 0xFF0, len: 32 }));
    assert!(ram.load_image(0xFE0, &[0; 32]).is_ok());
}

#[derive(Default)]
struct Recorder {
    writes: Mutex<Vec<(u32, u32, u64)>>,
}

impl MmioDevice for Recorder {
    fn read(&self, addr: u32, size: u32) -> u64 {
        (addr as u64) << 8 | size as u64
    }

    fn write(&self, addr: u32, size: u32, val: u64) {
        self.writes.lock().unwrap().push((addr, size, val));
    }
}

#[test]
fn device_window_routes_to_device() {
    let dev = Arc::new(Recorder::default());
    let ram = GuestRam::new(RAM_SIZE).unwrap().with_device(dev.clone());
    assert!(ram.is_mmio(0xE000_0000));
    assert!(!ram.is_mmio(0xDFFF_FFFF));
    assert_eq!(ram.read(0xE000_0010, 4), 0xE000_0010_04);
    ram.write(0xE000_0020, 8, 7);
    assert_eq!(*dev.writes.lock().unwrap(), [(0xE000_0020, 8, 7)]);
}

#[test]
fn device_window_can_move() {
    let ram = GuestRam::new(RAM_SIZE).unwrap().with_mmio_base(0x4000_0000);
    assert_eq!(ram.mmio_base(), 0x4000_0000);
    assert!(ram.is_mmio(0x4000_0000));
    // No device attached: reads yield zero.
    assert_eq!(ram.read(0x4000_0000, 4), 0);
}

// -- Interpreter --

#[test]
fn step_advances_pc_for_fall_through() {
    let mut cpu = CpuState::new();
    cpu.gpr[1] = 5;
    cpu.gpr[2] = 7;
    assert_eq!(run_one(encode::add(3, 1, 2), &mut cpu), Status::Continue);
    assert_eq!(cpu.gpr[3], 12);
    assert_eq!(cpu.pc, CODE as u64 + 4);
}

#[test]
fn syscall_advances_pc() {
    let mut cpu = CpuState::new();
    assert_eq!(run_one(encode::sc(), &mut cpu), Status::Syscall);
    assert_eq!(cpu.pc, CODE as u64 + 4);
}

#[test]
fn unknown_word_is_illegal() {
    let mut cpu = CpuState::new();
    assert_eq!(decode(0).class, InsnClass::Unknown);
    assert_eq!(run_one(0, &mut cpu), Status::Illegal);
    assert_eq!(cpu.pc, CODE as u64);
}

#[test]
fn trap_word_always_traps() {
    let mut cpu = CpuState::new();
    let tw = x_form(31, 31, 0, 0, 4, false);
    assert_eq!(run_one(tw, &mut cpu), Status::Trap);
    assert_eq!(cpu.pc, CODE as u64);
}

#[test]
fn divide_by_zero_yields_zero() {
    let mut cpu = CpuState::new();
    cpu.gpr[4] = 100;
    cpu.gpr[3] = 0xDEAD;
    // divwo r3, r4, r5
    let word = xo_form(3, 4, 5, true, 491, false);
    assert_eq!(run_one(word, &mut cpu), Status::Continue);
    assert_eq!(cpu.gpr[3], 0);
    assert_ne!(cpu.xer & xer::OV, 0);
}

#[test]
fn word_quotient_is_zero_extended() {
    let mut cpu = CpuState::new();
    cpu.gpr[4] = (-12i64) as u64;
    cpu.gpr[5] = 4;
    run_one(xo_form(3, 4, 5, false, 491, false), &mut cpu);
    assert_eq!(cpu.gpr[3], 0xFFFF_FFFD);
}

#[test]
fn rlwinm_extracts_field() {
    let mut cpu = CpuState::new();
    cpu.gpr[4] = 0x1234_5678;
    // Extract bits 8..15 of the word into the low byte.
    run_one(encode::rlwinm(3, 4, 16, 24, 31), &mut cpu);
    assert_eq!(cpu.gpr[3], 0x34);
}

#[test]
fn word_compare_ignores_high_half() {
    let mut cpu = CpuState::new();
    cpu.gpr[3] = 0xFFFF_FFFF_0000_0001;
    cpu.gpr[4] = 1;
    run_one(encode::cmp(2, false, 3, 4), &mut cpu);
    assert_eq!(cpu.cr_field(2), crbits::EQ);
    run_one(encode::cmp(2, true, 3, 4), &mut cpu);
    assert_eq!(cpu.cr_field(2), crbits::LT);
    run_one(encode::cmpli(3, true, 3, 1), &mut cpu);
    assert_eq!(cpu.cr_field(3), crbits::GT);
}

#[test]
fn loads_and_stores_use_guest_order() {
    let ram = GuestRam::new(RAM_SIZE).unwrap();
    let mut cpu = CpuState::new();
    cpu.gpr[1] = DATA as u64;
    cpu.gpr[5] = 0xCAFE_F00D;
    execute(&mut cpu, &ram, decode(encode::stw(5, 1, 8)));
    assert_eq!(ram.snapshot(DATA + 8, 4), [0xCA, 0xFE, 0xF0, 0x0D]);
    execute(&mut cpu, &ram, decode(encode::lbz(6, 1, 9)));
    assert_eq!(cpu.gpr[6], 0xFE);
    execute(&mut cpu, &ram, decode(encode::stwu(5, 1, -16)));
    assert_eq!(cpu.gpr[1], DATA as u64 - 16);
}

#[test]
fn vector_access_is_aligned() {
    let ram = GuestRam::new(RAM_SIZE).unwrap();
    let mut cpu = CpuState::new();
    cpu.gpr[1] = DATA as u64;
    cpu.gpr[2] = 0x1F;
    cpu.vr[4] = 0x0011_2233_4455_6677_8899_AABB_CCDD_EEFF;
    execute(&mut cpu, &ram, decode(encode::stvx(4, 1, 2)));
    assert_eq!(ram.read(DATA + 0x10, 1), 0x00);
    assert_eq!(ram.read(DATA + 0x1F, 1), 0xFF);
    execute(&mut cpu, &ram, decode(encode::lvx(7, 1, 2)));
    assert_eq!(cpu.vr[7], cpu.vr[4]);
}

#[test]
fn link_branch_reports_call() {
    let mut cpu = CpuState::new();
    assert_eq!(run_one(encode::b(0x40, false, true), &mut cpu), Status::Call);
    assert_eq!(cpu.pc, CODE as u64 + 0x40);
    assert_eq!(cpu.lr, CODE as u64 + 4);
}

#[test]
fn blr_reports_return() {
    let mut cpu = CpuState::new();
    cpu.lr = 0x2003;
    assert_eq!(run_one(encode::blr(), &mut cpu), Status::Return);
    assert_eq!(cpu.pc, 0x2000);
}

#[test]
fn bdnz_counts_down() {
    let mut cpu = CpuState::new();
    cpu.ctr = 2;
    assert_eq!(run_one(encode::bdnz(-8), &mut cpu), Status::Branch);
    assert_eq!(cpu.ctr, 1);
    assert_eq!(cpu.pc, CODE as u64 - 8);
    assert_eq!(run_one(encode::bdnz(-8), &mut cpu), Status::Continue);
    assert_eq!(cpu.ctr, 0);
    assert_eq!(cpu.pc, CODE as u64 + 4);
}

#[test]
fn bcctr_with_decrement_is_illegal() {
    let mut cpu = CpuState::new();
    assert_eq!(run_one(encode::bcctr(0, 0, false), &mut cpu), Status::Illegal);
}

#[test]
fn spr_moves() {
    let mut cpu = CpuState::new();
    cpu.gpr[4] = 0x1234;
    run_one(encode::mtctr(4), &mut cpu);
    assert_eq!(cpu.ctr, 0x1234);
    run_one(encode::mtspr(spr::SPRG0 + 1, 4), &mut cpu);
    assert_eq!(cpu.sprg[1], 0x1234);
    cpu.lr = 0x99;
    run_one(encode::mflr(5), &mut cpu);
    assert_eq!(cpu.gpr[5], 0x99);
}
