//! Operand field extraction.
//!
//! Bit positions use the guest numbering: bit 0 is the most
//! significant bit of the word.

use crate::class::InsnClass;

/// A decoded instruction: the raw word plus its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insn {
    pub word: u32,
    pub class: InsnClass,
}

/// Sign-extend the low `bits` bits of `val`.
pub const fn sext(val: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((val << shift) as i32) >> shift
}

impl Insn {
    pub const fn new(word: u32, class: InsnClass) -> Self {
        Self { word, class }
    }

    #[inline]
    const fn bits(&self, shift: u32, width: u32) -> u32 {
        (self.word >> shift) & ((1 << width) - 1)
    }

    // -- Register fields --

    /// Target register (RT/RS/FRT/FRS/VD/VS), bits 6..10.
    pub const fn rt(&self) -> usize {
        self.bits(21, 5) as usize
    }
    pub const fn rs(&self) -> usize {
        self.rt()
    }
    /// Bits 11..15.
    pub const fn ra(&self) -> usize {
        self.bits(16, 5) as usize
    }
    /// Bits 16..20.
    pub const fn rb(&self) -> usize {
        self.bits(11, 5) as usize
    }
    /// Bits 21..25 (FRC/VC).
    pub const fn rc_reg(&self) -> usize {
        self.bits(6, 5) as usize
    }

    // -- Immediates --

    pub const fn simm(&self) -> i64 {
        self.word as u16 as i16 as i64
    }
    pub const fn uimm(&self) -> u64 {
        (self.word & 0xFFFF) as u64
    }
    /// DS-form displacement (low two bits cleared).
    pub const fn ds(&self) -> i64 {
        (self.word & 0xFFFC) as u16 as i16 as i64
    }

    // -- Flag bits --

    /// Record bit (bit 31).
    pub const fn rc(&self) -> bool {
        self.word & 1 != 0
    }
    /// Link bit (bit 31).
    pub const fn lk(&self) -> bool {
        self.word & 1 != 0
    }
    /// Absolute-address bit (bit 30).
    pub const fn aa(&self) -> bool {
        self.word & 2 != 0
    }
    /// Overflow-enable bit of XO forms (bit 21).
    pub const fn oe(&self) -> bool {
        self.word & 0x400 != 0
    }
    /// Record bit of VC forms (bit 21).
    pub const fn vrc(&self) -> bool {
        self.word & 0x400 != 0
    }

    // -- Branch fields --

    pub const fn bo(&self) -> u32 {
        self.bits(21, 5)
    }
    pub const fn bi(&self) -> u32 {
        self.bits(16, 5)
    }
    /// I-form displacement, sign-extended.
    pub const fn li(&self) -> i32 {
        sext(self.word & 0x03FF_FFFC, 26)
    }
    /// B-form displacement, sign-extended.
    pub const fn bd(&self) -> i32 {
        self.word as u16 as i16 as i32 & !3
    }

    /// Resolved target of a `b` or `bc` at `pc`.
    pub const fn branch_target(&self, pc: u32) -> u32 {
        let disp = match self.class {
            InsnClass::B => self.li(),
            _ => self.bd(),
        };
        if self.aa() {
            disp as u32
        } else {
            pc.wrapping_add(disp as u32)
        }
    }

    // -- Compare / CR fields --

    pub const fn crfd(&self) -> u32 {
        self.bits(23, 3)
    }
    pub const fn crfs(&self) -> u32 {
        self.bits(18, 3)
    }
    /// Compare width bit: set for 64-bit compares.
    pub const fn cmp_l(&self) -> bool {
        self.bits(21, 1) != 0
    }
    pub const fn crbd(&self) -> u32 {
        self.bits(21, 5)
    }
    pub const fn crba(&self) -> u32 {
        self.bits(16, 5)
    }
    pub const fn crbb(&self) -> u32 {
        self.bits(11, 5)
    }
    /// mtcrf field mask.
    pub const fn crm(&self) -> u32 {
        self.bits(12, 8)
    }
    /// mtfsf field mask.
    pub const fn fm(&self) -> u32 {
        self.bits(17, 8)
    }
    /// Trap condition (TO).
    pub const fn to(&self) -> u32 {
        self.bits(21, 5)
    }

    // -- Rotate fields --

    /// 32-bit rotate shift count (SH).
    pub const fn sh32(&self) -> u32 {
        self.bits(11, 5)
    }
    pub const fn mb32(&self) -> u32 {
        self.bits(6, 5)
    }
    pub const fn me32(&self) -> u32 {
        self.bits(1, 5)
    }
    /// 6-bit shift count of MD/XS forms (split field).
    pub const fn sh64(&self) -> u32 {
        self.bits(11, 5) | ((self.word & 2) << 4)
    }
    /// 6-bit mask begin/end of MD/MDS forms (split field).
    pub const fn mb64(&self) -> u32 {
        self.bits(6, 5) | (self.word & 0x20)
    }

    // -- SPR --

    /// SPR number with its two halves swapped back.
    pub const fn spr(&self) -> u32 {
        self.bits(16, 5) | (self.bits(11, 5) << 5)
    }

    // -- Vector fields --

    pub const fn vd(&self) -> usize {
        self.rt()
    }
    pub const fn va(&self) -> usize {
        self.ra()
    }
    pub const fn vb(&self) -> usize {
        self.rb()
    }
    pub const fn vc(&self) -> usize {
        self.rc_reg()
    }
    /// vsldoi byte shift.
    pub const fn vshb(&self) -> u32 {
        self.bits(6, 4)
    }
    /// Unsigned 5-bit immediate in the VA slot (splat index).
    pub const fn vuimm(&self) -> u32 {
        self.bits(16, 5)
    }
    /// Signed 5-bit immediate in the VA slot (splat immediate).
    pub const fn vsimm(&self) -> i32 {
        sext(self.bits(16, 5), 5)
    }
}

/// SPR numbers the translator knows.
pub mod spr {
    pub const XER: u32 = 1;
    pub const LR: u32 = 8;
    pub const CTR: u32 = 9;
    pub const VRSAVE: u32 = 256;
    pub const TBL: u32 = 268;
    pub const TBU: u32 = 269;
    pub const SPRG0: u32 = 272;
    pub const SPRG3: u32 = 275;
}

/// BO field bits.
pub mod bo {
    /// Ignore the CR bit.
    pub const NO_COND: u32 = 0x10;
    /// Expected CR bit value.
    pub const COND_TRUE: u32 = 0x08;
    /// Do not decrement CTR.
    pub const NO_CTR: u32 = 0x04;
    /// Branch when the decremented CTR is zero.
    pub const CTR_ZERO: u32 = 0x02;
    /// Branch always.
    pub const ALWAYS: u32 = NO_COND | NO_CTR;
}
