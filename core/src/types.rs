/// IR value types.
///
/// Scalar ops run on `I32`/`I64`; vector lane ops and whole-register
/// moves of the 128-bit vector file run on `V128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Type {
    I32 = 0,
    I64 = 1,
    V128 = 2,
}

pub const TYPE_COUNT: usize = 3;

impl Type {
    pub const fn size_bits(self) -> u32 {
        match self {
            Type::I32 => 32,
            Type::I64 => 64,
            Type::V128 => 128,
        }
    }

    pub const fn size_bytes(self) -> u32 {
        self.size_bits() / 8
    }

    pub const fn is_vector(self) -> bool {
        matches!(self, Type::V128)
    }

    /// All-ones value of this width.
    pub const fn mask(self) -> u128 {
        match self {
            Type::I32 => 0xFFFF_FFFF,
            Type::I64 => u64::MAX as u128,
            Type::V128 => u128::MAX,
        }
    }
}

/// Comparison conditions for branch/setcond operations.
///
/// Encoding follows the TCG numbering so condition codes can be
/// carried in constant op arguments unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    Never = 0,
    Always = 1,
    Eq = 8,
    Ne = 9,
    // Signed
    Lt = 10,
    Ge = 11,
    Le = 12,
    Gt = 13,
    // Unsigned
    Ltu = 14,
    Geu = 15,
    Leu = 16,
    Gtu = 17,
    // Test (AND then compare vs 0)
    TstEq = 18,
    TstNe = 19,
}

impl Cond {
    /// Decode a condition from its constant-argument encoding.
    pub const fn from_raw(v: u32) -> Option<Cond> {
        Some(match v {
            0 => Cond::Never,
            1 => Cond::Always,
            8 => Cond::Eq,
            9 => Cond::Ne,
            10 => Cond::Lt,
            11 => Cond::Ge,
            12 => Cond::Le,
            13 => Cond::Gt,
            14 => Cond::Ltu,
            15 => Cond::Geu,
            16 => Cond::Leu,
            17 => Cond::Gtu,
            18 => Cond::TstEq,
            19 => Cond::TstNe,
            _ => return None,
        })
    }

    /// Return the inverted condition.
    pub const fn invert(self) -> Cond {
        match self {
            Cond::Never => Cond::Always,
            Cond::Always => Cond::Never,
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Le => Cond::Gt,
            Cond::Gt => Cond::Le,
            Cond::Ltu => Cond::Geu,
            Cond::Geu => Cond::Ltu,
            Cond::Leu => Cond::Gtu,
            Cond::Gtu => Cond::Leu,
            Cond::TstEq => Cond::TstNe,
            Cond::TstNe => Cond::TstEq,
        }
    }

    /// Swap operand order (e.g. Lt becomes Gt).
    pub const fn swap(self) -> Cond {
        match self {
            Cond::Eq
            | Cond::Ne
            | Cond::Never
            | Cond::Always
            | Cond::TstEq
            | Cond::TstNe => self,
            Cond::Lt => Cond::Gt,
            Cond::Ge => Cond::Le,
            Cond::Le => Cond::Ge,
            Cond::Gt => Cond::Lt,
            Cond::Ltu => Cond::Gtu,
            Cond::Geu => Cond::Leu,
            Cond::Leu => Cond::Geu,
            Cond::Gtu => Cond::Ltu,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Cond::Lt | Cond::Ge | Cond::Le | Cond::Gt)
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, Cond::Ltu | Cond::Geu | Cond::Leu | Cond::Gtu)
    }

    pub const fn is_tst(self) -> bool {
        matches!(self, Cond::TstEq | Cond::TstNe)
    }

    /// Short mnemonic used by the IR dump.
    pub const fn name(self) -> &'static str {
        match self {
            Cond::Never => "never",
            Cond::Always => "always",
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Lt => "lt",
            Cond::Ge => "ge",
            Cond::Le => "le",
            Cond::Gt => "gt",
            Cond::Ltu => "ltu",
            Cond::Geu => "geu",
            Cond::Leu => "leu",
            Cond::Gtu => "gtu",
            Cond::TstEq => "tsteq",
            Cond::TstNe => "tstne",
        }
    }
}

/// Guest memory operation descriptor: access size and signedness.
///
/// Guest loads and stores in the IR are raw (host byte order); the
/// byte swap to guest order is emitted as a separate op so the MMIO
/// path can skip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemOp(u16);

impl MemOp {
    pub const SIZE_8: u16 = 0;
    pub const SIZE_16: u16 = 1;
    pub const SIZE_32: u16 = 2;
    pub const SIZE_64: u16 = 3;
    pub const SIZE_128: u16 = 4;
    pub const SIZE_MASK: u16 = 0x7;

    pub const SIGN: u16 = 1 << 3;

    pub const fn new(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn ub() -> Self {
        Self(Self::SIZE_8)
    }
    pub const fn sb() -> Self {
        Self(Self::SIZE_8 | Self::SIGN)
    }
    pub const fn uw() -> Self {
        Self(Self::SIZE_16)
    }
    pub const fn sw() -> Self {
        Self(Self::SIZE_16 | Self::SIGN)
    }
    pub const fn ul() -> Self {
        Self(Self::SIZE_32)
    }
    pub const fn uq() -> Self {
        Self(Self::SIZE_64)
    }
    pub const fn uo() -> Self {
        Self(Self::SIZE_128)
    }

    /// Unsigned access of `bytes` (1, 2, 4, 8 or 16).
    pub const fn from_bytes(bytes: u32) -> Self {
        match bytes {
            1 => Self::ub(),
            2 => Self::uw(),
            4 => Self::ul(),
            8 => Self::uq(),
            _ => Self::uo(),
        }
    }

    pub const fn bits(self) -> u16 {
        self.0
    }
    pub const fn size(self) -> u16 {
        self.0 & Self::SIZE_MASK
    }
    pub const fn is_signed(self) -> bool {
        self.0 & Self::SIGN != 0
    }
    pub const fn size_bytes(self) -> u32 {
        1 << self.size()
    }
}

/// Vector element size carried by lane ops (`vece`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Vece {
    B8 = 0,
    H16 = 1,
    W32 = 2,
    D64 = 3,
}

impl Vece {
    pub const fn from_raw(v: u32) -> Vece {
        match v & 3 {
            0 => Vece::B8,
            1 => Vece::H16,
            2 => Vece::W32,
            _ => Vece::D64,
        }
    }

    pub const fn lane_bits(self) -> u32 {
        8 << (self as u32)
    }

    pub const fn lanes(self) -> u32 {
        128 / self.lane_bits()
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            Vece::B8 => "8",
            Vece::H16 => "16",
            Vece::W32 => "32",
            Vece::D64 => "64",
        }
    }
}
