use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::Insn;

use super::Status;
use crate::cpu::CpuState;

type Mem<'a> = &'a dyn GuestMemory;

/// FPSCR floating-point condition code (FPCC) position.
const FPCC_SHIFT: u32 = 12;
const SIGN: u64 = 1 << 63;

fn f(v: u64) -> f64 {
    f64::from_bits(v)
}

/// Rc=1 copies FPSCR[FX,FEX,VX,OX] into CR1.
fn record(cpu: &mut CpuState, i: Insn) {
    if i.rc() {
        let v = cpu.fpscr >> 28;
        cpu.set_cr_field(1, v);
    }
}

fn round_single(x: f64) -> f64 {
    x as f32 as f64
}

pub(super) fn move_sign(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let b = cpu.fpr[i.rb()];
    cpu.fpr[i.rt()] = match i.class {
        Fneg => b ^ SIGN,
        Fabs => b & !SIGN,
        Fnabs => b | SIGN,
        _ => b,
    };
    record(cpu, i);
    Status::Continue
}

pub(super) fn arith(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = f(cpu.fpr[i.ra()]);
    let b = f(cpu.fpr[i.rb()]);
    let c = f(cpu.fpr[i.rc_reg()]);
    let r = match i.class {
        Fadd => a + b,
        Fsub => a - b,
        Fmul => a * c,
        Fdiv => a / b,
        Fsqrt => b.sqrt(),
        Fmadd => a.mul_add(c, b),
        Fmsub => a.mul_add(c, -b),
        Fsel => {
            if a >= 0.0 {
                c
            } else {
                b
            }
        }
        Fadds => round_single(a + b),
        Fsubs => round_single(a - b),
        Fmuls => round_single(a * c),
        Fdivs => round_single(a / b),
        Fsqrts => round_single(b.sqrt()),
        Fmadds => round_single(a.mul_add(c, b)),
        Fmsubs => round_single(a.mul_add(c, -b)),
        _ => return Status::Illegal,
    };
    cpu.fpr[i.rt()] = r.to_bits();
    record(cpu, i);
    Status::Continue
}

pub(super) fn convert(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let b = f(cpu.fpr[i.rb()]);
    cpu.fpr[i.rt()] = match i.class {
        Frsp => round_single(b).to_bits(),
        Fctiwz => {
            let v = if b.is_nan() { i32::MIN } else { b as i32 };
            v as u32 as u64
        }
        Fctidz => {
            let v = if b.is_nan() { i64::MIN } else { b as i64 };
            v as u64
        }
        Fcfid => (cpu.fpr[i.rb()] as i64 as f64).to_bits(),
        _ => return Status::Illegal,
    };
    record(cpu, i);
    Status::Continue
}

pub(super) fn compare(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = f(cpu.fpr[i.ra()]);
    let b = f(cpu.fpr[i.rb()]);
    let c = match a.partial_cmp(&b) {
        Some(std::cmp::Ordering::Less) => 8,
        Some(std::cmp::Ordering::Greater) => 4,
        Some(std::cmp::Ordering::Equal) => 2,
        None => 1,
    };
    cpu.fpscr = (cpu.fpscr & !(0xF << FPCC_SHIFT)) | (c << FPCC_SHIFT);
    cpu.set_cr_field(i.crfd(), c);
    Status::Continue
}

pub(super) fn fpscr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    match i.class {
        Mffs => cpu.fpr[i.rt()] = cpu.fpscr as u64,
        Mtfsf => {
            let fm = i.fm();
            let mut mask = 0u32;
            for n in 0..8 {
                if fm & (0x80 >> n) != 0 {
                    mask |= 0xF << ((7 - n) * 4);
                }
            }
            let v = cpu.fpr[i.rb()] as u32;
            cpu.fpscr = (cpu.fpscr & !mask) | (v & mask);
        }
        Mtfsb0 => cpu.fpscr &= !(1 << (31 - i.crbd())),
        Mtfsb1 => cpu.fpscr |= 1 << (31 - i.crbd()),
        _ => return Status::Illegal,
    }
    record(cpu, i);
    Status::Continue
}
