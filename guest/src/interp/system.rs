use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::Insn;

use super::{ea, Status};
use crate::cpu::CpuState;

type Mem<'a> = &'a dyn GuestMemory;

/// PPU cache line size, the block `dcbz` clears.
pub const CACHE_LINE: u64 = 128;

pub(super) fn sc(_: &mut CpuState, _: Mem, _: Insn) -> Status {
    Status::Syscall
}

pub(super) fn trap(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let a = cpu.gpr[i.ra()];
    let b = match i.class {
        Tw | Td => cpu.gpr[i.rb()],
        _ => i.simm() as u64,
    };
    let (sa, sb, ua, ub) = match i.class {
        Tw | Twi => (a as i32 as i64, b as i32 as i64, a as u32 as u64, b as u32 as u64),
        _ => (a as i64, b as i64, a, b),
    };
    let to = i.to();
    let hit = (to & 0x10 != 0 && sa < sb)
        || (to & 0x08 != 0 && sa > sb)
        || (to & 0x04 != 0 && sa == sb)
        || (to & 0x02 != 0 && ua < ub)
        || (to & 0x01 != 0 && ua > ub);
    if hit {
        Status::Trap
    } else {
        Status::Continue
    }
}

/// Barriers and cache hints have no architectural effect here.
pub(super) fn nop(_: &mut CpuState, _: Mem, _: Insn) -> Status {
    Status::Continue
}

pub(super) fn dcbz(cpu: &mut CpuState, mem: Mem, i: Insn) -> Status {
    let addr = ea(cpu, i.ra(), cpu.gpr[i.rb()]) & !(CACHE_LINE - 1);
    mem.store_raw(addr as u32, &[0u8; CACHE_LINE as usize]);
    Status::Continue
}
