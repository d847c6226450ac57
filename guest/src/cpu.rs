//! PPU register file.
//!
//! `CpuState` is `#[repr(C)]`; generated code addresses its fields
//! through the byte offsets exported below.

use std::fmt;
use std::mem::offset_of;

/// CR field bits, as they sit in a 4-bit field.
pub mod crbits {
    pub const LT: u32 = 8;
    pub const GT: u32 = 4;
    pub const EQ: u32 = 2;
    pub const SO: u32 = 1;
}

/// XER bits.
pub mod xer {
    pub const SO: u64 = 1 << 31;
    pub const OV: u64 = 1 << 30;
    pub const CA: u64 = 1 << 29;
    /// Bits software can observe (SO, OV, CA, byte count).
    pub const MASK: u64 = 0xE000_007F;
}

/// FPSCR bits.
pub mod fpscr {
    /// Every bit but the reserved bit 20.
    pub const MASK: u32 = 0xFFFF_F7FF;
}

/// VSCR bits.
pub mod vscr {
    pub const SAT: u32 = 1;
    pub const NJ: u32 = 1 << 16;
}

/// Guest-visible register state of one hardware thread.
#[repr(C)]
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CpuState {
    pub gpr: [u64; 32],
    /// IEEE double bit patterns.
    pub fpr: [u64; 32],
    /// Byte 0 of the guest register is the most significant byte.
    pub vr: [u128; 32],
    pub pc: u64,
    pub lr: u64,
    pub ctr: u64,
    pub xer: u64,
    pub cr: u32,
    pub fpscr: u32,
    pub vscr: u32,
    pub vrsave: u32,
    pub sprg: [u64; 4],
    /// Time base, advanced by `mftb`.
    pub tb: u64,
    /// lwarx/ldarx reservation address; valid when `reserve_valid`
    /// is non-zero.
    pub reserve_addr: u64,
    pub reserve_valid: u64,
}

// -- Field offsets for generated code --

pub const OFFSET_PC: i64 = offset_of!(CpuState, pc) as i64;
pub const OFFSET_LR: i64 = offset_of!(CpuState, lr) as i64;
pub const OFFSET_CTR: i64 = offset_of!(CpuState, ctr) as i64;
pub const OFFSET_XER: i64 = offset_of!(CpuState, xer) as i64;
pub const OFFSET_CR: i64 = offset_of!(CpuState, cr) as i64;
pub const OFFSET_FPSCR: i64 = offset_of!(CpuState, fpscr) as i64;
pub const OFFSET_VSCR: i64 = offset_of!(CpuState, vscr) as i64;
pub const OFFSET_VRSAVE: i64 = offset_of!(CpuState, vrsave) as i64;
pub const OFFSET_TB: i64 = offset_of!(CpuState, tb) as i64;

pub const fn gpr_offset(n: usize) -> i64 {
    (offset_of!(CpuState, gpr) + n * 8) as i64
}

pub const fn fpr_offset(n: usize) -> i64 {
    (offset_of!(CpuState, fpr) + n * 8) as i64
}

pub const fn vr_offset(n: usize) -> i64 {
    (offset_of!(CpuState, vr) + n * 16) as i64
}

pub const fn sprg_offset(n: usize) -> i64 {
    (offset_of!(CpuState, sprg) + n * 8) as i64
}

impl CpuState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pointer handed to compiled code.
    pub fn as_env_ptr(&mut self) -> *mut u8 {
        self as *mut CpuState as *mut u8
    }

    // -- CR access --

    /// 4-bit field `n` (0 is the most significant).
    pub fn cr_field(&self, n: u32) -> u32 {
        (self.cr >> ((7 - n) * 4)) & 0xF
    }

    pub fn set_cr_field(&mut self, n: u32, val: u32) {
        let shift = (7 - n) * 4;
        self.cr = (self.cr & !(0xF << shift)) | ((val & 0xF) << shift);
    }

    /// CR bit `bi` (0 is the most significant).
    pub fn cr_bit(&self, bi: u32) -> bool {
        (self.cr >> (31 - bi)) & 1 != 0
    }

    pub fn set_cr_bit(&mut self, bi: u32, val: bool) {
        let m = 1 << (31 - bi);
        if val {
            self.cr |= m;
        } else {
            self.cr &= !m;
        }
    }

    // -- XER access --

    pub fn so(&self) -> bool {
        self.xer & xer::SO != 0
    }

    pub fn ca(&self) -> bool {
        self.xer & xer::CA != 0
    }

    pub fn set_ca(&mut self, ca: bool) {
        if ca {
            self.xer |= xer::CA;
        } else {
            self.xer &= !xer::CA;
        }
    }

    /// Set OV and accumulate SO.
    pub fn set_ov(&mut self, ov: bool) {
        if ov {
            self.xer |= xer::OV | xer::SO;
        } else {
            self.xer &= !xer::OV;
        }
    }

    /// CR field value from a signed compare with the SO copy.
    pub fn compare_signed(&self, a: i64, b: i64) -> u32 {
        let ord = match a.cmp(&b) {
            std::cmp::Ordering::Less => crbits::LT,
            std::cmp::Ordering::Greater => crbits::GT,
            std::cmp::Ordering::Equal => crbits::EQ,
        };
        ord | self.so() as u32
    }

    pub fn compare_unsigned(&self, a: u64, b: u64) -> u32 {
        let ord = match a.cmp(&b) {
            std::cmp::Ordering::Less => crbits::LT,
            std::cmp::Ordering::Greater => crbits::GT,
            std::cmp::Ordering::Equal => crbits::EQ,
        };
        ord | self.so() as u32
    }

    /// Record-form update of CR0 from a 64-bit result.
    pub fn set_cr0(&mut self, val: u64) {
        let f = self.compare_signed(val as i64, 0);
        self.set_cr_field(0, f);
    }

    /// Field-by-field difference against `other`, for mismatch
    /// reports.
    pub fn diff(&self, other: &CpuState) -> Vec<String> {
        let mut out = Vec::new();
        for i in 0..32 {
            if self.gpr[i] != other.gpr[i] {
                out.push(format!("r{i}: {:#018x} != {:#018x}", self.gpr[i], other.gpr[i]));
            }
            if self.fpr[i] != other.fpr[i] {
                out.push(format!("f{i}: {:#018x} != {:#018x}", self.fpr[i], other.fpr[i]));
            }
            if self.vr[i] != other.vr[i] {
                out.push(format!("v{i}: {:#034x} != {:#034x}", self.vr[i], other.vr[i]));
            }
        }
        let scalars: [(&str, u64, u64); 12] = [
            ("pc", self.pc, other.pc),
            ("lr", self.lr, other.lr),
            ("ctr", self.ctr, other.ctr),
            ("xer", self.xer, other.xer),
            ("cr", self.cr as u64, other.cr as u64),
            ("fpscr", self.fpscr as u64, other.fpscr as u64),
            ("vscr", self.vscr as u64, other.vscr as u64),
            ("vrsave", self.vrsave as u64, other.vrsave as u64),
            ("tb", self.tb, other.tb),
            ("reserve_addr", self.reserve_addr, other.reserve_addr),
            ("reserve_valid", self.reserve_valid, other.reserve_valid),
            ("sprg0", self.sprg[0], other.sprg[0]),
        ];
        for (name, a, b) in scalars {
            if a != b {
                out.push(format!("{name}: {a:#x} != {b:#x}"));
            }
        }
        for i in 1..4 {
            if self.sprg[i] != other.sprg[i] {
                out.push(format!("sprg{i}: {:#x} != {:#x}", self.sprg[i], other.sprg[i]));
            }
        }
        out
    }
}

impl fmt::Debug for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pc={:#018x} lr={:#018x} ctr={:#018x}",
            self.pc, self.lr, self.ctr
        )?;
        writeln!(
            f,
            "cr={:08x} xer={:#x} fpscr={:08x} vscr={:08x} vrsave={:08x}",
            self.cr, self.xer, self.fpscr, self.vscr, self.vrsave
        )?;
        for row in 0..8 {
            for col in 0..4 {
                let i = row * 4 + col;
                write!(f, "r{i:<2}={:016x} ", self.gpr[i])?;
            }
            writeln!(f)?;
        }
        for row in 0..8 {
            for col in 0..4 {
                let i = row * 4 + col;
                write!(f, "f{i:<2}={:016x} ", self.fpr[i])?;
            }
            writeln!(f)?;
        }
        for i in 0..32 {
            writeln!(f, "v{i:<2}={:032x}", self.vr[i])?;
        }
        write!(
            f,
            "sprg={:x?} tb={:#x} reserve={:#x}/{}",
            self.sprg, self.tb, self.reserve_addr, self.reserve_valid
        )
    }
}
