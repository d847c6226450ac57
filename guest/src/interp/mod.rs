//! Reference interpreter.
//!
//! One free function per instruction class, all with the
//! [`InterpFn`] signature. The translator calls these through the
//! fallback bridge, and the differential harness uses them as the
//! oracle.
//!
//! Handlers for non-branch classes leave `pc` alone and return
//! [`Status::Continue`]; [`step`] advances it. Branch handlers set
//! `pc` themselves.

mod branch;
mod float;
mod integer;
mod memory;
mod system;
mod vector;

use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass::{self, *};
use ppujit_decode::{decode, Insn};

use crate::cpu::CpuState;

/// Outcome of interpreting one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Fall through; `pc` not yet advanced.
    Continue,
    /// Control transfer without link; `pc` holds the next address.
    Branch,
    /// Taken branch-and-link; `pc` holds the callee, LR the return.
    Call,
    /// Taken `blr`-style return; `pc` holds the return address.
    Return,
    /// `sc`; `pc` not yet advanced.
    Syscall,
    /// A trap condition fired.
    Trap,
    /// Unknown encoding or unsupported operand combination.
    Illegal,
}

pub type InterpFn = fn(&mut CpuState, &dyn GuestMemory, Insn) -> Status;

/// Interpreter entry point for `class`.
pub fn handler(class: InsnClass) -> InterpFn {
    match class {
        // -- Integer --
        Addi => integer::addi,
        Addis => integer::addis,
        Addic => integer::addic,
        AddicRc => integer::addic_rc,
        Subfic => integer::subfic,
        Mulli => integer::mulli,
        Add | Addc | Adde | Addze | Addme | Subf | Subfc | Subfe | Subfze
        | Subfme | Neg => integer::add_family,
        Mullw | Mulld | Mulhw | Mulhwu | Mulhd | Mulhdu => integer::mul_family,
        Divw | Divwu | Divd | Divdu => integer::div_family,
        And | Andc | Or | Orc | Xor | Nor | Nand | Eqv => integer::logical,
        AndiRc | AndisRc | Ori | Oris | Xori | Xoris => integer::logical_imm,
        Extsb | Extsh | Extsw | Cntlzw | Cntlzd => integer::unary,
        Slw | Srw | Sraw | Srawi | Sld | Srd | Srad | Sradi => integer::shift,
        Rlwinm | Rlwimi | Rlwnm => integer::rotate32,
        Rldicl | Rldicr | Rldic | Rldimi | Rldcl | Rldcr => integer::rotate64,
        Cmp | Cmpl | Cmpi | Cmpli => integer::compare,
        Crand | Cror | Crxor | Crnand | Crnor | Creqv | Crandc | Crorc => {
            integer::cr_logical
        }
        Mcrf => integer::mcrf,
        Mfcr => integer::mfcr,
        Mtcrf => integer::mtcrf,
        Mfspr => integer::mfspr,
        Mtspr => integer::mtspr,
        Mftb => integer::mftb,

        // -- Branch --
        B => branch::b,
        Bc => branch::bc,
        Bclr => branch::bclr,
        Bcctr => branch::bcctr,

        // -- System --
        Sc => system::sc,
        Tw | Twi | Td | Tdi => system::trap,
        Sync | Isync | Eieio | Dcbt | Dcbtst | Dcbf | Dcbst | Icbi => system::nop,
        Dcbz => system::dcbz,

        // -- Memory --
        Lbz | Lbzu | Lbzx | Lbzux | Lhz | Lhzu | Lhzx | Lhzux | Lha | Lhau
        | Lhax | Lhaux | Lwz | Lwzu | Lwzx | Lwzux | Lwa | Lwax | Lwaux | Ld
        | Ldu | Ldx | Ldux | Lhbrx | Lwbrx => memory::load,
        Stb | Stbu | Stbx | Stbux | Sth | Sthu | Sthx | Sthux | Stw | Stwu
        | Stwx | Stwux | Std | Stdu | Stdx | Stdux | Sthbrx | Stwbrx => {
            memory::store
        }
        Lmw => memory::lmw,
        Stmw => memory::stmw,
        Lwarx | Ldarx => memory::load_reserve,
        Stwcx | Stdcx => memory::store_conditional,
        Lfs | Lfsu | Lfsx | Lfsux | Lfd | Lfdu | Lfdx | Lfdux => memory::load_float,
        Stfs | Stfsu | Stfsx | Stfsux | Stfd | Stfdu | Stfdx | Stfdux => {
            memory::store_float
        }
        Lvx => memory::lvx,
        Stvx => memory::stvx,

        // -- Float --
        Fmr | Fneg | Fabs | Fnabs => float::move_sign,
        Fadd | Fsub | Fmul | Fdiv | Fsqrt | Fmadd | Fmsub | Fsel | Fadds
        | Fsubs | Fmuls | Fdivs | Fsqrts | Fmadds | Fmsubs => float::arith,
        Frsp | Fctiwz | Fctidz | Fcfid => float::convert,
        Fcmpu | Fcmpo => float::compare,
        Mffs | Mtfsf | Mtfsb0 | Mtfsb1 => float::fpscr,

        // -- Vector --
        Vsel => vector::vsel,
        Vperm => vector::vperm,
        Vsldoi => vector::vsldoi,
        Vmaddfp | Vnmsubfp | Vaddfp | Vsubfp => vector::float_arith,
        Vcmpeqfp | Vcmpgefp | Vcmpgtfp => vector::float_compare,
        Vcmpequb | Vcmpequh | Vcmpequw | Vcmpgtub | Vcmpgtuh | Vcmpgtuw
        | Vcmpgtsb | Vcmpgtsh | Vcmpgtsw => vector::int_compare,
        Vspltb | Vsplth | Vspltw => vector::splat,
        Vspltisb | Vspltish | Vspltisw => vector::splat_imm,
        Mfvscr => vector::mfvscr,
        Mtvscr => vector::mtvscr,
        Vand | Vandc | Vor | Vxor | Vnor => vector::logical,
        Vaddubm | Vadduhm | Vadduwm | Vsububm | Vsubuhm | Vsubuwm | Vaddubs
        | Vadduhs | Vadduws | Vaddsbs | Vaddshs | Vaddsws | Vsububs | Vsubuhs
        | Vsubuws | Vsubsbs | Vsubshs | Vsubsws | Vmaxub | Vmaxuh | Vmaxuw
        | Vmaxsb | Vmaxsh | Vmaxsw | Vminub | Vminuh | Vminuw | Vminsb | Vminsh
        | Vminsw | Vrlb | Vrlh | Vrlw | Vslb | Vslh | Vslw | Vsrb | Vsrh
        | Vsrw | Vsrab | Vsrah | Vsraw => vector::int_arith,

        Unknown => illegal,
    }
}

fn illegal(_: &mut CpuState, _: &dyn GuestMemory, _: Insn) -> Status {
    Status::Illegal
}

/// Interpret one decoded instruction.
pub fn execute(cpu: &mut CpuState, mem: &dyn GuestMemory, insn: Insn) -> Status {
    handler(insn.class)(cpu, mem, insn)
}

/// Fetch, decode and interpret the instruction at `pc`, advancing
/// `pc` for fall-through results.
pub fn step(cpu: &mut CpuState, mem: &dyn GuestMemory) -> Status {
    let word = mem.fetch32(cpu.pc as u32);
    let status = execute(cpu, mem, decode(word));
    if matches!(status, Status::Continue | Status::Syscall) {
        cpu.pc = cpu.pc.wrapping_add(4);
    }
    status
}

// -- Shared bit helpers --

/// Mask with guest bits `mb..=me` set (bit 0 is the MSB), wrapping
/// when `mb > me`.
pub const fn rotate_mask(mb: u32, me: u32) -> u64 {
    let begin = u64::MAX >> mb;
    let end = if me >= 63 { 0 } else { u64::MAX >> (me + 1) };
    if mb <= me {
        begin ^ end
    } else {
        !(begin ^ end)
    }
}

/// Rotate the low word left, replicated into both halves.
pub const fn rotl32_dup(val: u64, n: u32) -> u64 {
    let r = (val as u32).rotate_left(n) as u64;
    r | (r << 32)
}

/// Effective address of a D/X-form access: `(ra|0) + offset`.
pub(crate) fn ea(cpu: &CpuState, ra: usize, offset: u64) -> u64 {
    let base = if ra == 0 { 0 } else { cpu.gpr[ra] };
    base.wrapping_add(offset)
}
