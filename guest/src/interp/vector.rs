//! Vector unit. Lane `i` of width `w` sits at bits
//! `[128-(i+1)w, 128-iw)`, so lane 0 is the guest's first element.

use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::Insn;

use super::Status;
use crate::cpu::{vscr, CpuState};

type Mem<'a> = &'a dyn GuestMemory;

fn lane(v: u128, w: u32, i: u32) -> u64 {
    let mask = if w == 64 { u64::MAX } else { (1u64 << w) - 1 };
    (v >> (128 - (i + 1) * w)) as u64 & mask
}

fn with_lane(v: u128, w: u32, i: u32, x: u64) -> u128 {
    let mask = if w == 64 { u64::MAX as u128 } else { (1u128 << w) - 1 };
    let shift = 128 - (i + 1) * w;
    (v & !(mask << shift)) | ((x as u128 & mask) << shift)
}

fn signed(x: u64, w: u32) -> i64 {
    ((x << (64 - w)) as i64) >> (64 - w)
}

/// Apply `f` lane-wise over `a` and `b`.
fn map2(a: u128, b: u128, w: u32, mut f: impl FnMut(u64, u64) -> u64) -> u128 {
    (0..128 / w).fold(0, |acc, i| with_lane(acc, w, i, f(lane(a, w, i), lane(b, w, i))))
}

fn record_cr6(cpu: &mut CpuState, r: u128, w: u32) {
    let lanes = 128 / w;
    let set = (0..lanes).filter(|&i| lane(r, w, i) != 0).count() as u32;
    let all = if set == lanes { 8 } else { 0 };
    let none = if set == 0 { 2 } else { 0 };
    cpu.set_cr_field(6, all | none);
}

pub(super) fn vsel(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let (a, b, c) = (cpu.vr[i.va()], cpu.vr[i.vb()], cpu.vr[i.vc()]);
    cpu.vr[i.vd()] = (b & c) | (a & !c);
    Status::Continue
}

fn concat(a: u128, b: u128) -> [u8; 32] {
    let mut src = [0u8; 32];
    src[..16].copy_from_slice(&a.to_be_bytes());
    src[16..].copy_from_slice(&b.to_be_bytes());
    src
}

pub(super) fn vperm(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let src = concat(cpu.vr[i.va()], cpu.vr[i.vb()]);
    let sel = cpu.vr[i.vc()].to_be_bytes();
    let mut out = [0u8; 16];
    for (o, s) in out.iter_mut().zip(sel) {
        *o = src[(s & 0x1F) as usize];
    }
    cpu.vr[i.vd()] = u128::from_be_bytes(out);
    Status::Continue
}

pub(super) fn vsldoi(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let src = concat(cpu.vr[i.va()], cpu.vr[i.vb()]);
    let shb = i.vshb() as usize;
    let mut out = [0u8; 16];
    out.copy_from_slice(&src[shb..shb + 16]);
    cpu.vr[i.vd()] = u128::from_be_bytes(out);
    Status::Continue
}

/// Flush a denormal single to a signed zero when VSCR[NJ] is set.
fn flush(cpu: &CpuState, x: f32) -> f32 {
    if cpu.vscr & vscr::NJ != 0 && x.is_subnormal() {
        if x.is_sign_negative() {
            -0.0
        } else {
            0.0
        }
    } else {
        x
    }
}

pub(super) fn float_arith(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let (va, vb, vc) = (cpu.vr[i.va()], cpu.vr[i.vb()], cpu.vr[i.vc()]);
    let mut r = 0u128;
    for n in 0..4 {
        let a = flush(cpu, f32::from_bits(lane(va, 32, n) as u32));
        let b = flush(cpu, f32::from_bits(lane(vb, 32, n) as u32));
        let c = flush(cpu, f32::from_bits(lane(vc, 32, n) as u32));
        let x = match i.class {
            Vaddfp => a + b,
            Vsubfp => a - b,
            Vmaddfp => a.mul_add(c, b),
            Vnmsubfp => -(a.mul_add(c, -b)),
            _ => return Status::Illegal,
        };
        r = with_lane(r, 32, n, flush(cpu, x).to_bits() as u64);
    }
    cpu.vr[i.vd()] = r;
    Status::Continue
}

pub(super) fn float_compare(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let (va, vb) = (cpu.vr[i.va()], cpu.vr[i.vb()]);
    let class = i.class;
    let r = map2(va, vb, 32, |x, y| {
        let (a, b) = (f32::from_bits(x as u32), f32::from_bits(y as u32));
        let t = match class {
            Vcmpeqfp => a == b,
            Vcmpgefp => a >= b,
            _ => a > b,
        };
        if t {
            u32::MAX as u64
        } else {
            0
        }
    });
    cpu.vr[i.vd()] = r;
    if i.vrc() {
        record_cr6(cpu, r, 32);
    }
    Status::Continue
}

pub(super) fn int_compare(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let w = match i.class {
        Vcmpequb | Vcmpgtub | Vcmpgtsb => 8,
        Vcmpequh | Vcmpgtuh | Vcmpgtsh => 16,
        _ => 32,
    };
    let class = i.class;
    let ones = (1u64 << w) - 1;
    let r = map2(cpu.vr[i.va()], cpu.vr[i.vb()], w, |a, b| {
        let t = match class {
            Vcmpequb | Vcmpequh | Vcmpequw => a == b,
            Vcmpgtub | Vcmpgtuh | Vcmpgtuw => a > b,
            _ => signed(a, w) > signed(b, w),
        };
        if t {
            ones
        } else {
            0
        }
    });
    cpu.vr[i.vd()] = r;
    if i.vrc() {
        record_cr6(cpu, r, w);
    }
    Status::Continue
}

fn splat_lanes(w: u32, x: u64) -> u128 {
    (0..128 / w).fold(0, |acc, n| with_lane(acc, w, n, x))
}

pub(super) fn splat(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let w = match i.class {
        Vspltb => 8,
        Vsplth => 16,
        _ => 32,
    };
    let idx = i.vuimm() % (128 / w);
    let x = lane(cpu.vr[i.vb()], w, idx);
    cpu.vr[i.vd()] = splat_lanes(w, x);
    Status::Continue
}

pub(super) fn splat_imm(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let w = match i.class {
        Vspltisb => 8,
        Vspltish => 16,
        _ => 32,
    };
    cpu.vr[i.vd()] = splat_lanes(w, i.vsimm() as i64 as u64);
    Status::Continue
}

pub(super) fn mfvscr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    cpu.vr[i.vd()] = cpu.vscr as u128;
    Status::Continue
}

pub(super) fn mtvscr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    cpu.vscr = cpu.vr[i.vb()] as u32;
    Status::Continue
}

pub(super) fn logical(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let (a, b) = (cpu.vr[i.va()], cpu.vr[i.vb()]);
    cpu.vr[i.vd()] = match i.class {
        Vand => a & b,
        Vandc => a & !b,
        Vor => a | b,
        Vxor => a ^ b,
        Vnor => !(a | b),
        _ => return Status::Illegal,
    };
    Status::Continue
}

#[derive(Clone, Copy)]
enum LaneOp {
    Add,
    Sub,
    AddSatU,
    AddSatS,
    SubSatU,
    SubSatS,
    MaxU,
    MaxS,
    MinU,
    MinS,
    Rotl,
    Shl,
    Shr,
    Sar,
}

fn lane_op(class: ppujit_decode::InsnClass) -> Option<(LaneOp, u32)> {
    use LaneOp::*;
    Some(match class {
        Vaddubm => (Add, 8),
        Vadduhm => (Add, 16),
        Vadduwm => (Add, 32),
        Vsububm => (Sub, 8),
        Vsubuhm => (Sub, 16),
        Vsubuwm => (Sub, 32),
        Vaddubs => (AddSatU, 8),
        Vadduhs => (AddSatU, 16),
        Vadduws => (AddSatU, 32),
        Vaddsbs => (AddSatS, 8),
        Vaddshs => (AddSatS, 16),
        Vaddsws => (AddSatS, 32),
        Vsububs => (SubSatU, 8),
        Vsubuhs => (SubSatU, 16),
        Vsubuws => (SubSatU, 32),
        Vsubsbs => (SubSatS, 8),
        Vsubshs => (SubSatS, 16),
        Vsubsws => (SubSatS, 32),
        Vmaxub => (MaxU, 8),
        Vmaxuh => (MaxU, 16),
        Vmaxuw => (MaxU, 32),
        Vmaxsb => (MaxS, 8),
        Vmaxsh => (MaxS, 16),
        Vmaxsw => (MaxS, 32),
        Vminub => (MinU, 8),
        Vminuh => (MinU, 16),
        Vminuw => (MinU, 32),
        Vminsb => (MinS, 8),
        Vminsh => (MinS, 16),
        Vminsw => (MinS, 32),
        Vrlb => (Rotl, 8),
        Vrlh => (Rotl, 16),
        Vrlw => (Rotl, 32),
        Vslb => (Shl, 8),
        Vslh => (Shl, 16),
        Vslw => (Shl, 32),
        Vsrb => (Shr, 8),
        Vsrh => (Shr, 16),
        Vsrw => (Shr, 32),
        Vsrab => (Sar, 8),
        Vsrah => (Sar, 16),
        Vsraw => (Sar, 32),
        _ => return None,
    })
}

pub(super) fn int_arith(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let Some((op, w)) = lane_op(i.class) else {
        return Status::Illegal;
    };
    let ones = (1u64 << w) - 1;
    let (smin, smax) = (-(1i64 << (w - 1)), (1i64 << (w - 1)) - 1);
    let mut sat = false;
    let mut clamp = |v: i64, lo: i64, hi: i64| {
        if v < lo || v > hi {
            sat = true;
        }
        v.clamp(lo, hi) as u64
    };
    let r = map2(cpu.vr[i.va()], cpu.vr[i.vb()], w, |a, b| {
        let n = (b & (w as u64 - 1)) as u32;
        match op {
            LaneOp::Add => a.wrapping_add(b),
            LaneOp::Sub => a.wrapping_sub(b),
            LaneOp::AddSatU => clamp(a as i64 + b as i64, 0, ones as i64),
            LaneOp::SubSatU => clamp(a as i64 - b as i64, 0, ones as i64),
            LaneOp::AddSatS => clamp(signed(a, w) + signed(b, w), smin, smax),
            LaneOp::SubSatS => clamp(signed(a, w) - signed(b, w), smin, smax),
            LaneOp::MaxU => a.max(b),
            LaneOp::MinU => a.min(b),
            LaneOp::MaxS => signed(a, w).max(signed(b, w)) as u64,
            LaneOp::MinS => signed(a, w).min(signed(b, w)) as u64,
            LaneOp::Rotl => {
                if n == 0 {
                    a
                } else {
                    (a << n) | (a >> (w - n))
                }
            }
            LaneOp::Shl => a << n,
            LaneOp::Shr => a >> n,
            LaneOp::Sar => (signed(a, w) >> n) as u64,
        }
    });
    cpu.vr[i.vd()] = r;
    if sat {
        cpu.vscr |= vscr::SAT;
    }
    Status::Continue
}
