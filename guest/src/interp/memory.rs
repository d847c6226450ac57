use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass::{self, *};
use ppujit_decode::Insn;

use super::{ea, Status};
use crate::cpu::{crbits, CpuState};

type Mem<'a> = &'a dyn GuestMemory;

/// Shape of an integer or float load/store class.
#[derive(Debug, Clone, Copy)]
struct Access {
    size: u32,
    signed: bool,
    update: bool,
    indexed: bool,
    reversed: bool,
    /// DS-form displacement.
    ds: bool,
}

const fn acc(size: u32, signed: bool, update: bool, indexed: bool) -> Access {
    Access {
        size,
        signed,
        update,
        indexed,
        reversed: false,
        ds: false,
    }
}

const fn ds(size: u32, signed: bool, update: bool) -> Access {
    Access {
        size,
        signed,
        update,
        indexed: false,
        reversed: false,
        ds: true,
    }
}

const fn rev(size: u32) -> Access {
    Access {
        size,
        signed: false,
        update: false,
        indexed: true,
        reversed: true,
        ds: false,
    }
}

/// Access shape of a load/store class, `None` for anything else.
fn access_of(class: InsnClass) -> Option<Access> {
    Some(match class {
        Lbz | Stb => acc(1, false, false, false),
        Lbzu | Stbu => acc(1, false, true, false),
        Lbzx | Stbx => acc(1, false, false, true),
        Lbzux | Stbux => acc(1, false, true, true),
        Lhz | Sth => acc(2, false, false, false),
        Lhzu | Sthu => acc(2, false, true, false),
        Lhzx | Sthx => acc(2, false, false, true),
        Lhzux | Sthux => acc(2, false, true, true),
        Lha => acc(2, true, false, false),
        Lhau => acc(2, true, true, false),
        Lhax => acc(2, true, false, true),
        Lhaux => acc(2, true, true, true),
        Lwz | Stw => acc(4, false, false, false),
        Lwzu | Stwu => acc(4, false, true, false),
        Lwzx | Stwx => acc(4, false, false, true),
        Lwzux | Stwux => acc(4, false, true, true),
        Lwa => ds(4, true, false),
        Lwax => acc(4, true, false, true),
        Lwaux => acc(4, true, true, true),
        Ld | Std => ds(8, false, false),
        Ldu | Stdu => ds(8, false, true),
        Ldx | Stdx => acc(8, false, false, true),
        Ldux | Stdux => acc(8, false, true, true),
        Lhbrx | Sthbrx => rev(2),
        Lwbrx | Stwbrx => rev(4),
        _ => return float_access_of(class),
    })
}

fn float_access_of(class: InsnClass) -> Option<Access> {
    Some(match class {
        Lfs | Stfs => acc(4, false, false, false),
        Lfsu | Stfsu => acc(4, false, true, false),
        Lfsx | Stfsx => acc(4, false, false, true),
        Lfsux | Stfsux => acc(4, false, true, true),
        Lfd | Stfd => acc(8, false, false, false),
        Lfdu | Stfdu => acc(8, false, true, false),
        Lfdx | Stfdx => acc(8, false, false, true),
        Lfdux | Stfdux => acc(8, false, true, true),
        _ => return None,
    })
}

/// Effective address; update forms use RA even when it is r0.
fn address(cpu: &CpuState, i: Insn, a: Access) -> u64 {
    let offset = if a.indexed {
        cpu.gpr[i.rb()]
    } else if a.ds {
        i.ds() as u64
    } else {
        i.simm() as u64
    };
    if a.update {
        cpu.gpr[i.ra()].wrapping_add(offset)
    } else {
        ea(cpu, i.ra(), offset)
    }
}

fn swap(val: u64, size: u32) -> u64 {
    match size {
        2 => (val as u16).swap_bytes() as u64,
        4 => (val as u32).swap_bytes() as u64,
        8 => val.swap_bytes(),
        _ => val,
    }
}

fn sign_extend(val: u64, size: u32) -> u64 {
    match size {
        1 => val as i8 as i64 as u64,
        2 => val as i16 as i64 as u64,
        4 => val as i32 as i64 as u64,
        _ => val,
    }
}

pub(super) fn load(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let Some(a) = access_of(i.class) else {
        return Status::Illegal;
    };
    let addr = address(cpu, i, a);
    let mut v = mem.read(addr as u32, a.size);
    if a.reversed {
        v = swap(v, a.size);
    }
    if a.signed {
        v = sign_extend(v, a.size);
    }
    cpu.gpr[i.rt()] = v;
    if a.update {
        cpu.gpr[i.ra()] = addr;
    }
    Status::Continue
}

pub(super) fn store(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let Some(a) = access_of(i.class) else {
        return Status::Illegal;
    };
    let addr = address(cpu, i, a);
    let mut v = cpu.gpr[i.rs()];
    if a.reversed {
        v = swap(v, a.size);
    }
    mem.write(addr as u32, a.size, v);
    if a.update {
        cpu.gpr[i.ra()] = addr;
    }
    Status::Continue
}

pub(super) fn lmw(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let mut addr = ea(cpu, i.ra(), i.simm() as u64);
    for r in i.rt()..32 {
        cpu.gpr[r] = mem.read(addr as u32, 4);
        addr = addr.wrapping_add(4);
    }
    Status::Continue
}

pub(super) fn stmw(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let mut addr = ea(cpu, i.ra(), i.simm() as u64);
    for r in i.rs()..32 {
        mem.write(addr as u32, 4, cpu.gpr[r] as u32 as u64);
        addr = addr.wrapping_add(4);
    }
    Status::Continue
}

pub(super) fn load_reserve(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let addr = ea(cpu, i.ra(), cpu.gpr[i.rb()]);
    let size = if i.class == Ldarx { 8 } else { 4 };
    cpu.gpr[i.rt()] = mem.read(addr as u32, size);
    cpu.reserve_addr = addr;
    cpu.reserve_valid = 1;
    Status::Continue
}

pub(super) fn store_conditional(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let addr = ea(cpu, i.ra(), cpu.gpr[i.rb()]);
    let size = if i.class == Stdcx { 8 } else { 4 };
    let ok = cpu.reserve_valid != 0 && cpu.reserve_addr == addr;
    if ok {
        mem.write(addr as u32, size, cpu.gpr[i.rs()]);
    }
    cpu.reserve_valid = 0;
    let f = (if ok { crbits::EQ } else { 0 }) | cpu.so() as u32;
    cpu.set_cr_field(0, f);
    Status::Continue
}

pub(super) fn load_float(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let Some(a) = access_of(i.class) else {
        return Status::Illegal;
    };
    let addr = address(cpu, i, a);
    let raw = mem.read(addr as u32, a.size);
    cpu.fpr[i.rt()] = if a.size == 4 {
        (f32::from_bits(raw as u32) as f64).to_bits()
    } else {
        raw
    };
    if a.update {
        cpu.gpr[i.ra()] = addr;
    }
    Status::Continue
}

pub(super) fn store_float(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let Some(a) = access_of(i.class) else {
        return Status::Illegal;
    };
    let addr = address(cpu, i, a);
    let f = cpu.fpr[i.rs()];
    let v = if a.size == 4 {
        (f64::from_bits(f) as f32).to_bits() as u64
    } else {
        f
    };
    mem.write(addr as u32, a.size, v);
    if a.update {
        cpu.gpr[i.ra()] = addr;
    }
    Status::Continue
}

pub(super) fn lvx(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let addr = ea(cpu, i.ra(), cpu.gpr[i.rb()]) & !15;
    cpu.vr[i.vd()] = mem.read_u128(addr as u32);
    Status::Continue
}

pub(super) fn stvx(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let addr = ea(cpu, i.ra(), cpu.gpr[i.rb()]) & !15;
    mem.write_u128(addr as u32, cpu.vr[i.vd()]);
    Status::Continue
}
