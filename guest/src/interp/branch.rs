use ppujit_core::runtime::GuestMemory;
use ppujit_decode::fields::bo;
use ppujit_decode::Insn;

use super::Status;
use crate::cpu::CpuState;

type Mem<'a> = &'a dyn GuestMemory;

/// Evaluate the BO/BI condition, decrementing CTR when BO asks for it.
pub(crate) fn branch_taken(cpu: &mut CpuState, bo_f: u32, bi: u32) -> bool {
    let ctr_ok = if bo_f & bo::NO_CTR == 0 {
        cpu.ctr = cpu.ctr.wrapping_sub(1);
        (cpu.ctr != 0) ^ (bo_f & bo::CTR_ZERO != 0)
    } else {
        true
    };
    let cond_ok = bo_f & bo::NO_COND != 0 || cpu.cr_bit(bi) == (bo_f & bo::COND_TRUE != 0);
    ctr_ok && cond_ok
}

fn transfer(cpu: &mut CpuState, i: Insn, target: u64, taken: bool, ret: Status) -> Status {
    let next = cpu.pc.wrapping_add(4);
    if i.lk() {
        cpu.lr = next;
    }
    if !taken {
        return Status::Continue;
    }
    cpu.pc = target;
    if i.lk() {
        Status::Call
    } else {
        ret
    }
}

pub(super) fn b(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let target = i.branch_target(cpu.pc as u32) as u64;
    transfer(cpu, i, target, true, Status::Branch)
}

pub(super) fn bc(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let taken = branch_taken(cpu, i.bo(), i.bi());
    let target = i.branch_target(cpu.pc as u32) as u64;
    transfer(cpu, i, target, taken, Status::Branch)
}

pub(super) fn bclr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    let target = cpu.lr & !3;
    let taken = branch_taken(cpu, i.bo(), i.bi());
    transfer(cpu, i, target, taken, Status::Return)
}

pub(super) fn bcctr(cpu: &mut CpuState, _: Mem, i: Insn) -> Status {
    if i.bo() & bo::NO_CTR == 0 {
        return Status::Illegal;
    }
    let target = cpu.ctr & !3;
    let taken = branch_taken(cpu, i.bo(), i.bi());
    transfer(cpu, i, target, taken, Status::Branch)
}
