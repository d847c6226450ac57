use crate::types::Type;

/// IR opcodes.
///
/// Scalar ops (marked with `OpFlags::INT`) are type-polymorphic;
/// the actual width is carried in `Op::op_type`. The bitwise logic
/// ops and `Mov` additionally accept `V128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // -- Data movement --
    Mov = 0,
    SetCond,
    MovCond,

    // -- Arithmetic --
    Add,
    Sub,
    Mul,
    Neg,
    DivS, // x / 0 and MIN / -1 yield 0
    DivU, // x / 0 yields 0
    MulSH, // signed multiply high
    MulUH, // unsigned multiply high

    // -- Logic --
    And,
    Or,
    Xor,
    Not,
    AndC, // a & ~b
    OrC,  // a | ~b
    Eqv,  // ~(a ^ b)
    Nand,
    Nor,

    // -- Shift/rotate (amount taken modulo the width) --
    Shl,
    Shr,
    Sar,
    RotL,
    RotR,

    // -- Bit field --
    Extract,  // unsigned bit-field extract
    SExtract, // signed bit-field extract
    Deposit,  // bit-field deposit

    // -- Byte swap --
    Bswap16,
    Bswap32,
    Bswap64,
    Bswap128,

    // -- Bit counting --
    Clz, // count leading zeros; zero input yields the width

    // -- Type conversion --
    ExtI32I64,   // sign-extend i32 -> i64
    ExtUI32I64,  // zero-extend i32 -> i64
    ExtrlI64I32, // truncate i64 -> i32 (low)
    CvtF32F64,   // single bits (i32) -> double bits (i64)
    CvtF64F32,   // double bits (i64) -> single bits (i32)

    // -- Guest memory access --
    GuestLd, // raw RAM load, host byte order
    GuestSt, // raw RAM store, host byte order
    MmioLd,  // device window load, guest byte order
    MmioSt,  // device window store, guest byte order

    // -- Control flow --
    Br,        // unconditional branch to label
    BrCond,    // conditional branch
    SetLabel,  // define label position
    ExitTb,    // return an exit code to the dispatcher
    CallBlock, // run the cached block at an address until it returns

    // -- Call --
    Call,

    // -- Misc --
    Nop,
    InsnStart, // marks guest instruction boundary

    // -- Vector lanes --
    DupVec,     // broadcast scalar to all lanes
    ExtractVec, // read one lane as a scalar
    AddVec,
    SubVec,
    SsaddVec, // signed saturating add
    UsaddVec, // unsigned saturating add
    SssubVec, // signed saturating sub
    UssubVec, // unsigned saturating sub
    SminVec,
    UminVec,
    SmaxVec,
    UmaxVec,
    ShlvVec,
    ShrvVec,
    SarvVec,
    RotlvVec,
    CmpVec,    // per-lane compare producing all-ones/zero lanes
    BitselVec, // (b & sel) | (c & ~sel)

    // Sentinel; must be last
    Count,
}

/// Flags describing properties of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFlags(u16);

impl OpFlags {
    pub const NONE: OpFlags = OpFlags(0);
    /// Exits the translation unit.
    pub const BB_EXIT: OpFlags = OpFlags(0x01);
    /// Ends a basic block (next op starts a new BB).
    pub const BB_END: OpFlags = OpFlags(0x02);
    /// Calls out of generated code; clobbers any cached global.
    pub const CALL: OpFlags = OpFlags(0x04);
    /// Has side effects; cannot be eliminated.
    pub const SIDE_EFFECTS: OpFlags = OpFlags(0x08);
    /// Operands may be I32 or I64 (type-polymorphic).
    pub const INT: OpFlags = OpFlags(0x10);
    /// Vector lane operation.
    pub const VECTOR: OpFlags = OpFlags(0x40);
    /// Conditional branch (may or may not be taken).
    pub const COND_BRANCH: OpFlags = OpFlags(0x80);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Static definition of an opcode: argument counts and flags.
#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub name: &'static str,
    pub nb_oargs: u8,
    pub nb_iargs: u8,
    pub nb_cargs: u8,
    pub flags: OpFlags,
}

// Helper to combine flags in const context.
const fn f(a: OpFlags, b: OpFlags) -> OpFlags {
    OpFlags(a.0 | b.0)
}

const fn def(
    name: &'static str,
    nb_oargs: u8,
    nb_iargs: u8,
    nb_cargs: u8,
    flags: OpFlags,
) -> OpDef {
    OpDef {
        name,
        nb_oargs,
        nb_iargs,
        nb_cargs,
        flags,
    }
}

const INT: OpFlags = OpFlags::INT;
const SE: OpFlags = OpFlags::SIDE_EFFECTS;
const CL: OpFlags = OpFlags::CALL;
const BE: OpFlags = OpFlags::BB_END;
const BX: OpFlags = OpFlags::BB_EXIT;
const CB: OpFlags = OpFlags::COND_BRANCH;
const VC: OpFlags = OpFlags::VECTOR;
const N: OpFlags = OpFlags::NONE;

/// Static opcode definition table, indexed by `Opcode as usize`.
pub static OPCODE_DEFS: [OpDef; Opcode::Count as usize] = [
    // Data movement
    def("mov", 1, 1, 0, INT),
    def("setcond", 1, 2, 1, INT),
    def("movcond", 1, 4, 1, INT),
    // Arithmetic
    def("add", 1, 2, 0, INT),
    def("sub", 1, 2, 0, INT),
    def("mul", 1, 2, 0, INT),
    def("neg", 1, 1, 0, INT),
    def("divs", 1, 2, 0, INT),
    def("divu", 1, 2, 0, INT),
    def("mulsh", 1, 2, 0, INT),
    def("muluh", 1, 2, 0, INT),
    // Logic
    def("and", 1, 2, 0, INT),
    def("or", 1, 2, 0, INT),
    def("xor", 1, 2, 0, INT),
    def("not", 1, 1, 0, INT),
    def("andc", 1, 2, 0, INT),
    def("orc", 1, 2, 0, INT),
    def("eqv", 1, 2, 0, INT),
    def("nand", 1, 2, 0, INT),
    def("nor", 1, 2, 0, INT),
    // Shift/rotate
    def("shl", 1, 2, 0, INT),
    def("shr", 1, 2, 0, INT),
    def("sar", 1, 2, 0, INT),
    def("rotl", 1, 2, 0, INT),
    def("rotr", 1, 2, 0, INT),
    // Bit field: cargs (pos, len)
    def("extract", 1, 1, 2, INT),
    def("sextract", 1, 1, 2, INT),
    def("deposit", 1, 2, 2, INT),
    // Byte swap
    def("bswap16", 1, 1, 0, INT),
    def("bswap32", 1, 1, 0, INT),
    def("bswap64", 1, 1, 0, INT),
    def("bswap128", 1, 1, 0, VC),
    // Bit counting
    def("clz", 1, 1, 0, INT),
    // Type conversion
    def("ext_i32_i64", 1, 1, 0, N),
    def("extu_i32_i64", 1, 1, 0, N),
    def("extrl_i64_i32", 1, 1, 0, N),
    def("cvt_f32_f64", 1, 1, 0, N),
    def("cvt_f64_f32", 1, 1, 0, N),
    // Guest memory: cargs (memop)
    def("guest_ld", 1, 1, 1, SE),
    def("guest_st", 0, 2, 1, SE),
    def("mmio_ld", 1, 1, 1, f(SE, CL)),
    def("mmio_st", 0, 2, 1, f(SE, CL)),
    // Control flow
    def("br", 0, 0, 1, BE),
    def("brcond", 0, 2, 2, f(BE, CB)),
    def("set_label", 0, 0, 1, BE),
    def("exit_tb", 0, 0, 1, f(BX, BE)),
    def("call_block", 1, 1, 0, f(SE, CL)),
    // Call: 4 iargs, carg (helper id)
    def("call", 1, 4, 1, f(SE, CL)),
    // Misc
    def("nop", 0, 0, 0, N),
    def("insn_start", 0, 0, 1, N),
    // Vector lanes: cargs (vece[, ...])
    def("dup_vec", 1, 1, 1, VC),
    def("extract_vec", 1, 1, 2, VC),
    def("add_vec", 1, 2, 1, VC),
    def("sub_vec", 1, 2, 1, VC),
    def("ssadd_vec", 1, 2, 1, VC),
    def("usadd_vec", 1, 2, 1, VC),
    def("sssub_vec", 1, 2, 1, VC),
    def("ussub_vec", 1, 2, 1, VC),
    def("smin_vec", 1, 2, 1, VC),
    def("umin_vec", 1, 2, 1, VC),
    def("smax_vec", 1, 2, 1, VC),
    def("umax_vec", 1, 2, 1, VC),
    def("shlv_vec", 1, 2, 1, VC),
    def("shrv_vec", 1, 2, 1, VC),
    def("sarv_vec", 1, 2, 1, VC),
    def("rotlv_vec", 1, 2, 1, VC),
    def("cmp_vec", 1, 2, 2, VC),
    def("bitsel_vec", 1, 3, 0, VC),
];

impl Opcode {
    /// Every opcode in table order.
    pub const ALL: [Opcode; Opcode::Count as usize] = {
        use Opcode::*;
        [
            Mov, SetCond, MovCond, Add, Sub, Mul, Neg, DivS, DivU, MulSH,
            MulUH, And, Or, Xor, Not, AndC, OrC, Eqv, Nand, Nor, Shl, Shr,
            Sar, RotL, RotR, Extract, SExtract, Deposit, Bswap16, Bswap32,
            Bswap64, Bswap128, Clz, ExtI32I64, ExtUI32I64, ExtrlI64I32,
            CvtF32F64, CvtF64F32, GuestLd, GuestSt, MmioLd, MmioSt, Br,
            BrCond, SetLabel, ExitTb, CallBlock, Call, Nop, InsnStart,
            DupVec, ExtractVec, AddVec, SubVec, SsaddVec, UsaddVec,
            SssubVec, UssubVec, SminVec, UminVec, SmaxVec, UmaxVec, ShlvVec,
            ShrvVec, SarvVec, RotlvVec, CmpVec, BitselVec,
        ]
    };

    /// Look up the static definition for this opcode.
    pub fn def(self) -> &'static OpDef {
        &OPCODE_DEFS[self as usize]
    }

    /// Return the fixed IR type this opcode produces, if not
    /// type-polymorphic.
    pub fn fixed_type(self) -> Option<Type> {
        match self {
            Opcode::ExtI32I64 | Opcode::ExtUI32I64 | Opcode::CvtF32F64 => {
                Some(Type::I64)
            }
            Opcode::ExtrlI64I32 | Opcode::CvtF64F32 => Some(Type::I32),
            Opcode::CallBlock => Some(Type::I32),
            Opcode::ExtractVec => Some(Type::I64),
            _ if self.is_vector() => Some(Type::V128),
            _ => None,
        }
    }

    /// Whether this opcode is type-polymorphic.
    pub fn is_int_polymorphic(self) -> bool {
        self.def().flags.contains(OpFlags::INT)
    }

    /// Whether this is a vector lane operation.
    pub fn is_vector(self) -> bool {
        self.def().flags.contains(OpFlags::VECTOR)
    }
}
