use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::fields::spr;
use ppujit_decode::Insn;

use super::{rotate_mask, rotl32_dup, Status};
use crate::cpu::{xer, CpuState};

type Mem<'a> = &'a dyn GuestMemory;

/// a + b + carry_in, returning the sum and the carry out of bit 0.
fn add3(a: u64, b: u64, ci: bool) -> (u64, bool) {
    let (s1, c1) = a.overflowing_add(b);
    let (s2, c2) = s1.overflowing_add(ci as u64);
    (s2, c1 | c2)
}

/// Signed overflow of a 64-bit three-operand add.
fn add_overflows(a: u64, b: u64, r: u64) -> bool {
    ((a ^ r) & (b ^ r)) >> 63 != 0
}

fn ra_or_zero(cpu: &CpuState, ra: usize) -> u64 {
    if ra == 0 {
        0
    } else {
        cpu.gpr[ra]
    }
}

pub(super) fn addi(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    cpu.gpr[i.rt()] = ra_or_zero(cpu, i.ra()).wrapping_add(i.simm() as u64);
    Status::Continue
}

pub(super) fn addis(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    cpu.gpr[i.rt()] = ra_or_zero(cpu, i.ra()).wrapping_add((i.simm() << 16) as u64);
    Status::Continue
}

pub(super) fn addic(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let (r, ca) = add3(cpu.gpr[i.ra()], i.simm() as u64, false);
    cpu.gpr[i.rt()] = r;
    cpu.set_ca(ca);
    Status::Continue
}

pub(super) fn addic_rc(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    addic(cpu, mem, i);
    cpu.set_cr0(cpu.gpr[i.rt()]);
    Status::Continue
}

pub(super) fn subfic(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let (r, ca) = add3(!cpu.gpr[i.ra()], i.simm() as u64, true);
    cpu.gpr[i.rt()] = r;
    cpu.set_ca(ca);
    Status::Continue
}

pub(super) fn mulli(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    cpu.gpr[i.rt()] = (cpu.gpr[i.ra()] as i64).wrapping_mul(i.simm()) as u64;
    Status::Continue
}

/// add, addc, adde, addze, addme and the subf counterparts.
pub(super) fn add_family(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = cpu.gpr[i.ra()];
    let b = cpu.gpr[i.rb()];
    let ca = cpu.ca();
    // (first operand, second operand, carry in, writes CA)
    let (x, y, ci, sets_ca) = match i.class {
        Add => (a, b, false, false),
        Addc => (a, b, false, true),
        Adde => (a, b, ca, true),
        Addze => (a, 0, ca, true),
        Addme => (a, u64::MAX, ca, true),
        Subf => (!a, b, true, false),
        Subfc => (!a, b, true, true),
        Subfe => (!a, b, ca, true),
        Subfze => (!a, 0, ca, true),
        Subfme => (!a, u64::MAX, ca, true),
        // neg
        _ => (!a, 0, true, false),
    };
    let (r, co) = add3(x, y, ci);
    cpu.gpr[i.rt()] = r;
    if sets_ca {
        cpu.set_ca(co);
    }
    if i.oe() {
        cpu.set_ov(add_overflows(x, y, r));
    }
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn mul_family(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = cpu.gpr[i.ra()];
    let b = cpu.gpr[i.rb()];
    let (r, ov) = match i.class {
        Mullw => {
            let p = (a as i32 as i64) * (b as i32 as i64);
            (p as u64, p != p as i32 as i64)
        }
        Mulld => {
            let (p, o) = (a as i64).overflowing_mul(b as i64);
            (p as u64, o)
        }
        Mulhw => {
            let p = (a as i32 as i64) * (b as i32 as i64);
            ((p >> 32) as u64, false)
        }
        Mulhwu => {
            let p = (a as u32 as u64) * (b as u32 as u64);
            (p >> 32, false)
        }
        Mulhd => {
            let p = (a as i64 as i128) * (b as i64 as i128);
            ((p >> 64) as u64, false)
        }
        // mulhdu
        _ => {
            let p = (a as u128) * (b as u128);
            ((p >> 64) as u64, false)
        }
    };
    cpu.gpr[i.rt()] = r;
    if i.oe() && matches!(i.class, Mullw | Mulld) {
        cpu.set_ov(ov);
    }
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn div_family(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = cpu.gpr[i.ra()];
    let b = cpu.gpr[i.rb()];
    let (r, ov) = match i.class {
        Divw => {
            let (x, y) = (a as i32, b as i32);
            if y == 0 || (x == i32::MIN && y == -1) {
                (0, true)
            } else {
                ((x / y) as u32 as u64, false)
            }
        }
        Divwu => {
            let (x, y) = (a as u32, b as u32);
            if y == 0 {
                (0, true)
            } else {
                ((x / y) as u64, false)
            }
        }
        Divd => {
            let (x, y) = (a as i64, b as i64);
            if y == 0 || (x == i64::MIN && y == -1) {
                (0, true)
            } else {
                ((x / y) as u64, false)
            }
        }
        // divdu
        _ => {
            if b == 0 {
                (0, true)
            } else {
                (a / b, false)
            }
        }
    };
    cpu.gpr[i.rt()] = r;
    if i.oe() {
        cpu.set_ov(ov);
    }
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn logical(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let s = cpu.gpr[i.rs()];
    let b = cpu.gpr[i.rb()];
    let r = match i.class {
        And => s & b,
        Andc => s & !b,
        Or => s | b,
        Orc => s | !b,
        Xor => s ^ b,
        Nor => !(s | b),
        Nand => !(s & b),
        // eqv
        _ => !(s ^ b),
    };
    cpu.gpr[i.ra()] = r;
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn logical_imm(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let s = cpu.gpr[i.rs()];
    let u = i.uimm();
    let r = match i.class {
        AndiRc => s & u,
        AndisRc => s & (u << 16),
        Ori => s | u,
        Oris => s | (u << 16),
        Xori => s ^ u,
        // xoris
        _ => s ^ (u << 16),
    };
    cpu.gpr[i.ra()] = r;
    if matches!(i.class, AndiRc | AndisRc) {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn unary(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let s = cpu.gpr[i.rs()];
    let r = match i.class {
        Extsb => s as i8 as i64 as u64,
        Extsh => s as i16 as i64 as u64,
        Extsw => s as i32 as i64 as u64,
        Cntlzw => (s as u32).leading_zeros() as u64,
        // cntlzd
        _ => s.leading_zeros() as u64,
    };
    cpu.gpr[i.ra()] = r;
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn shift(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let s = cpu.gpr[i.rs()];
    let b = cpu.gpr[i.rb()];
    let r = match i.class {
        Slw => {
            let n = (b & 0x3F) as u32;
            if n > 31 {
                0
            } else {
                ((s as u32) << n) as u64
            }
        }
        Srw => {
            let n = (b & 0x3F) as u32;
            if n > 31 {
                0
            } else {
                ((s as u32) >> n) as u64
            }
        }
        Sraw | Srawi => {
            let n = if i.class == Srawi {
                i.sh32()
            } else {
                (b & 0x3F) as u32
            };
            let v = s as i32;
            let (r, ca) = if n > 31 {
                (v >> 31, v < 0)
            } else {
                let lost = (v as u32) & ((1u64 << n) - 1) as u32;
                (v >> n, v < 0 && lost != 0)
            };
            cpu.set_ca(ca);
            r as i64 as u64
        }
        Sld => {
            let n = (b & 0x7F) as u32;
            if n > 63 {
                0
            } else {
                s << n
            }
        }
        Srd => {
            let n = (b & 0x7F) as u32;
            if n > 63 {
                0
            } else {
                s >> n
            }
        }
        // srad, sradi
        _ => {
            let n = if i.class == Sradi {
                i.sh64()
            } else {
                (b & 0x7F) as u32
            };
            let v = s as i64;
            let (r, ca) = if n > 63 {
                (v >> 63, v < 0)
            } else {
                let lost = s & ((1u128 << n) - 1) as u64;
                (v >> n, v < 0 && lost != 0)
            };
            cpu.set_ca(ca);
            r as u64
        }
    };
    cpu.gpr[i.ra()] = r;
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn rotate32(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let s = cpu.gpr[i.rs()];
    let n = match i.class {
        Rlwnm => (cpu.gpr[i.rb()] & 0x1F) as u32,
        _ => i.sh32(),
    };
    let rot = rotl32_dup(s, n);
    let m = rotate_mask(i.mb32() + 32, i.me32() + 32);
    let r = match i.class {
        Rlwimi => (rot & m) | (cpu.gpr[i.ra()] & !m),
        _ => rot & m,
    };
    cpu.gpr[i.ra()] = r;
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn rotate64(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let s = cpu.gpr[i.rs()];
    let mb = i.mb64();
    let (n, m) = match i.class {
        Rldicl => (i.sh64(), rotate_mask(mb, 63)),
        Rldicr => (i.sh64(), rotate_mask(0, mb)),
        Rldic | Rldimi => (i.sh64(), rotate_mask(mb, 63 - i.sh64())),
        Rldcl => ((cpu.gpr[i.rb()] & 0x3F) as u32, rotate_mask(mb, 63)),
        // rldcr
        _ => ((cpu.gpr[i.rb()] & 0x3F) as u32, rotate_mask(0, mb)),
    };
    let rot = s.rotate_left(n);
    let r = match i.class {
        Rldimi => (rot & m) | (cpu.gpr[i.ra()] & !m),
        _ => rot & m,
    };
    cpu.gpr[i.ra()] = r;
    if i.rc() {
        cpu.set_cr0(r);
    }
    Status::Continue
}

pub(super) fn compare(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = cpu.gpr[i.ra()];
    let wide = i.cmp_l();
    let f = match i.class {
        Cmp | Cmpi => {
            let b = if i.class == Cmp {
                cpu.gpr[i.rb()]
            } else {
                i.simm() as u64
            };
            if wide {
                cpu.compare_signed(a as i64, b as i64)
            } else {
                cpu.compare_signed(a as i32 as i64, b as i32 as i64)
            }
        }
        // cmpl, cmpli
        _ => {
            let b = if i.class == Cmpl { cpu.gpr[i.rb()] } else { i.uimm() };
            if wide {
                cpu.compare_unsigned(a, b)
            } else {
                cpu.compare_unsigned(a as u32 as u64, b as u32 as u64)
            }
        }
    };
    cpu.set_cr_field(i.crfd(), f);
    Status::Continue
}

pub(super) fn cr_logical(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = cpu.cr_bit(i.crba());
    let b = cpu.cr_bit(i.crbb());
    let r = match i.class {
        Crand => a & b,
        Cror => a | b,
        Crxor => a ^ b,
        Crnand => !(a & b),
        Crnor => !(a | b),
        Creqv => !(a ^ b),
        Crandc => a & !b,
        // crorc
        _ => a | !b,
    };
    cpu.set_cr_bit(i.crbd(), r);
    Status::Continue
}

pub(super) fn mcrf(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let f = cpu.cr_field(i.crfs());
    cpu.set_cr_field(i.crfd(), f);
    Status::Continue
}

pub(super) fn mfcr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    cpu.gpr[i.rt()] = cpu.cr as u64;
    Status::Continue
}

pub(super) fn mtcrf(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let mut mask = 0u32;
    for f in 0..8 {
        if i.crm() & (0x80 >> f) != 0 {
            mask |= 0xF << ((7 - f) * 4);
        }
    }
    cpu.cr = (cpu.cr & !mask) | (cpu.gpr[i.rs()] as u32 & mask);
    Status::Continue
}

pub(super) fn mfspr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let v = match i.spr() {
        spr::XER => cpu.xer,
        spr::LR => cpu.lr,
        spr::CTR => cpu.ctr,
        spr::VRSAVE => cpu.vrsave as u64,
        n @ spr::SPRG0..=spr::SPRG3 => cpu.sprg[(n - spr::SPRG0) as usize],
        _ => return Status::Illegal,
    };
    cpu.gpr[i.rt()] = v;
    Status::Continue
}

pub(super) fn mtspr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let v = cpu.gpr[i.rs()];
    match i.spr() {
        spr::XER => cpu.xer = v & xer::MASK,
        spr::LR => cpu.lr = v,
        spr::CTR => cpu.ctr = v,
        spr::VRSAVE => cpu.vrsave = v as u32,
        n @ spr::SPRG0..=spr::SPRG3 => cpu.sprg[(n - spr::SPRG0) as usize] = v,
        _ => return Status::Illegal,
    }
    Status::Continue
}

/// Reads the time base, which then advances by one tick.
pub(super) fn mftb(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let v = match i.spr() {
        spr::TBL => cpu.tb,
        spr::TBU => cpu.tb >> 32,
        _ => return Status::Illegal,
    };
    cpu.gpr[i.rt()] = v;
    cpu.tb = cpu.tb.wrapping_add(1);
    Status::Continue
}
