//! Instruction class tags.
//!
//! Variants that differ only in Rc, OE, LK or AA share a class; the
//! handler reads those bits from the word.

/// Encoding layout of an instruction class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Form {
    I,
    B,
    Sc,
    D,
    Ds,
    X,
    Xo,
    Xl,
    Xfx,
    Xs,
    M,
    Md,
    Mds,
    A,
    Va,
    Vx,
    Vc,
    /// No fixed layout (`Unknown`).
    None,
}

impl Form {
    /// Bits that identify the class within its form; everything else
    /// is an operand field or a flag.
    pub const fn opcode_mask(self) -> u32 {
        match self {
            Form::I | Form::B | Form::D | Form::M => 0xFC00_0000,
            Form::Sc => 0xFC00_0002,
            Form::Ds => 0xFC00_0003,
            Form::X | Form::Xl | Form::Xfx => 0xFC00_07FE,
            Form::Xo => 0xFC00_03FE,
            Form::Xs => 0xFC00_07FC,
            Form::Md => 0xFC00_001C,
            Form::Mds => 0xFC00_001E,
            Form::A => 0xFC00_003E,
            Form::Va => 0xFC00_003F,
            Form::Vx => 0xFC00_07FF,
            Form::Vc => 0xFC00_03FF,
            Form::None => 0,
        }
    }

    /// Place the extended opcode `xo` where this form keeps it.
    const fn xo_bits(self, xo: u32) -> u32 {
        match self {
            Form::I | Form::B | Form::D | Form::M | Form::None => 0,
            Form::Sc => 2,
            Form::Ds | Form::Va | Form::Vx | Form::Vc => xo,
            Form::X | Form::Xl | Form::Xfx | Form::Xo | Form::A | Form::Mds => xo << 1,
            Form::Xs | Form::Md => xo << 2,
        }
    }
}

macro_rules! insn_classes {
    ($($name:ident => ($mnem:literal, $form:ident, $po:literal, $xo:literal)),* $(,)?) => {
        /// Every instruction class the decoder can produce.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum InsnClass {
            $($name,)*
            /// Reserved or unrecognized encoding.
            Unknown,
        }

        impl InsnClass {
            /// All recognized classes, in declaration order.
            pub const ALL: &'static [InsnClass] = &[$(InsnClass::$name,)*];

            /// Base mnemonic.
            pub const fn name(self) -> &'static str {
                match self {
                    $(InsnClass::$name => $mnem,)*
                    InsnClass::Unknown => "unknown",
                }
            }

            pub const fn form(self) -> Form {
                match self {
                    $(InsnClass::$name => Form::$form,)*
                    InsnClass::Unknown => Form::None,
                }
            }

            /// Primary opcode (bits 0..5).
            pub const fn primary(self) -> u32 {
                match self {
                    $(InsnClass::$name => $po,)*
                    InsnClass::Unknown => 0,
                }
            }

            /// Fixed opcode bits of every word of this class.
            pub const fn template(self) -> u32 {
                match self {
                    $(InsnClass::$name => ($po << 26) | Form::$form.xo_bits($xo),)*
                    InsnClass::Unknown => 0,
                }
            }
        }
    };
}

insn_classes! {
    // -- D-form integer --
    Tdi => ("tdi", D, 2, 0),
    Twi => ("twi", D, 3, 0),
    Mulli => ("mulli", D, 7, 0),
    Subfic => ("subfic", D, 8, 0),
    Cmpli => ("cmpli", D, 10, 0),
    Cmpi => ("cmpi", D, 11, 0),
    Addic => ("addic", D, 12, 0),
    AddicRc => ("addic.", D, 13, 0),
    Addi => ("addi", D, 14, 0),
    Addis => ("addis", D, 15, 0),
    Ori => ("ori", D, 24, 0),
    Oris => ("oris", D, 25, 0),
    Xori => ("xori", D, 26, 0),
    Xoris => ("xoris", D, 27, 0),
    AndiRc => ("andi.", D, 28, 0),
    AndisRc => ("andis.", D, 29, 0),

    // -- Branch / system --
    Bc => ("bc", B, 16, 0),
    Sc => ("sc", Sc, 17, 0),
    B => ("b", I, 18, 0),
    Mcrf => ("mcrf", Xl, 19, 0),
    Bclr => ("bclr", Xl, 19, 16),
    Crnor => ("crnor", Xl, 19, 33),
    Crandc => ("crandc", Xl, 19, 129),
    Isync => ("isync", Xl, 19, 150),
    Crxor => ("crxor", Xl, 19, 193),
    Crnand => ("crnand", Xl, 19, 225),
    Crand => ("crand", Xl, 19, 257),
    Creqv => ("creqv", Xl, 19, 289),
    Crorc => ("crorc", Xl, 19, 417),
    Cror => ("cror", Xl, 19, 449),
    Bcctr => ("bcctr", Xl, 19, 528),

    // -- Rotate --
    Rlwimi => ("rlwimi", M, 20, 0),
    Rlwinm => ("rlwinm", M, 21, 0),
    Rlwnm => ("rlwnm", M, 23, 0),
    Rldicl => ("rldicl", Md, 30, 0),
    Rldicr => ("rldicr", Md, 30, 1),
    Rldic => ("rldic", Md, 30, 2),
    Rldimi => ("rldimi", Md, 30, 3),
    Rldcl => ("rldcl", Mds, 30, 8),
    Rldcr => ("rldcr", Mds, 30, 9),

    // -- X-form, primary 31 --
    Cmp => ("cmp", X, 31, 0),
    Tw => ("tw", X, 31, 4),
    Lvx => ("lvx", X, 31, 103),
    Mfcr => ("mfcr", Xfx, 31, 19),
    Lwarx => ("lwarx", X, 31, 20),
    Ldx => ("ldx", X, 31, 21),
    Lwzx => ("lwzx", X, 31, 23),
    Slw => ("slw", X, 31, 24),
    Cntlzw => ("cntlzw", X, 31, 26),
    Sld => ("sld", X, 31, 27),
    And => ("and", X, 31, 28),
    Cmpl => ("cmpl", X, 31, 32),
    Dcbst => ("dcbst", X, 31, 54),
    Ldux => ("ldux", X, 31, 53),
    Lwzux => ("lwzux", X, 31, 55),
    Cntlzd => ("cntlzd", X, 31, 58),
    Andc => ("andc", X, 31, 60),
    Td => ("td", X, 31, 68),
    Ldarx => ("ldarx", X, 31, 84),
    Dcbf => ("dcbf", X, 31, 86),
    Lbzx => ("lbzx", X, 31, 87),
    Lbzux => ("lbzux", X, 31, 119),
    Nor => ("nor", X, 31, 124),
    Mtcrf => ("mtcrf", Xfx, 31, 144),
    Stdx => ("stdx", X, 31, 149),
    Stwcx => ("stwcx.", X, 31, 150),
    Stwx => ("stwx", X, 31, 151),
    Stdux => ("stdux", X, 31, 181),
    Stwux => ("stwux", X, 31, 183),
    Stdcx => ("stdcx.", X, 31, 214),
    Stbx => ("stbx", X, 31, 215),
    Stvx => ("stvx", X, 31, 231),
    Dcbtst => ("dcbtst", X, 31, 246),
    Stbux => ("stbux", X, 31, 247),
    Dcbt => ("dcbt", X, 31, 278),
    Lhzx => ("lhzx", X, 31, 279),
    Eqv => ("eqv", X, 31, 284),
    Lhzux => ("lhzux", X, 31, 311),
    Xor => ("xor", X, 31, 316),
    Mfspr => ("mfspr", Xfx, 31, 339),
    Lwax => ("lwax", X, 31, 341),
    Lhax => ("lhax", X, 31, 343),
    Mftb => ("mftb", Xfx, 31, 371),
    Lwaux => ("lwaux", X, 31, 373),
    Lhaux => ("lhaux", X, 31, 375),
    Sthx => ("sthx", X, 31, 407),
    Orc => ("orc", X, 31, 412),
    Sthux => ("sthux", X, 31, 439),
    Or => ("or", X, 31, 444),
    Mtspr => ("mtspr", Xfx, 31, 467),
    Nand => ("nand", X, 31, 476),
    Lwbrx => ("lwbrx", X, 31, 534),
    Lfsx => ("lfsx", X, 31, 535),
    Srw => ("srw", X, 31, 536),
    Srd => ("srd", X, 31, 539),
    Lfsux => ("lfsux", X, 31, 567),
    Sync => ("sync", X, 31, 598),
    Lfdx => ("lfdx", X, 31, 599),
    Lfdux => ("lfdux", X, 31, 631),
    Stwbrx => ("stwbrx", X, 31, 662),
    Stfsx => ("stfsx", X, 31, 663),
    Stfsux => ("stfsux", X, 31, 695),
    Stfdx => ("stfdx", X, 31, 727),
    Stfdux => ("stfdux", X, 31, 759),
    Lhbrx => ("lhbrx", X, 31, 790),
    Sraw => ("sraw", X, 31, 792),
    Srad => ("srad", X, 31, 794),
    Srawi => ("srawi", X, 31, 824),
    Sradi => ("sradi", Xs, 31, 413),
    Eieio => ("eieio", X, 31, 854),
    Sthbrx => ("sthbrx", X, 31, 918),
    Extsh => ("extsh", X, 31, 922),
    Extsb => ("extsb", X, 31, 954),
    Icbi => ("icbi", X, 31, 982),
    Extsw => ("extsw", X, 31, 986),
    Dcbz => ("dcbz", X, 31, 1014),

    // -- XO-form, primary 31 --
    Subfc => ("subfc", Xo, 31, 8),
    Mulhdu => ("mulhdu", Xo, 31, 9),
    Addc => ("addc", Xo, 31, 10),
    Mulhwu => ("mulhwu", Xo, 31, 11),
    Subf => ("subf", Xo, 31, 40),
    Mulhd => ("mulhd", Xo, 31, 73),
    Mulhw => ("mulhw", Xo, 31, 75),
    Neg => ("neg", Xo, 31, 104),
    Subfe => ("subfe", Xo, 31, 136),
    Adde => ("adde", Xo, 31, 138),
    Subfze => ("subfze", Xo, 31, 200),
    Addze => ("addze", Xo, 31, 202),
    Subfme => ("subfme", Xo, 31, 232),
    Mulld => ("mulld", Xo, 31, 233),
    Addme => ("addme", Xo, 31, 234),
    Mullw => ("mullw", Xo, 31, 235),
    Add => ("add", Xo, 31, 266),
    Divdu => ("divdu", Xo, 31, 457),
    Divwu => ("divwu", Xo, 31, 459),
    Divd => ("divd", Xo, 31, 489),
    Divw => ("divw", Xo, 31, 491),

    // -- Integer load/store, D/DS-form --
    Lwz => ("lwz", D, 32, 0),
    Lwzu => ("lwzu", D, 33, 0),
    Lbz => ("lbz", D, 34, 0),
    Lbzu => ("lbzu", D, 35, 0),
    Stw => ("stw", D, 36, 0),
    Stwu => ("stwu", D, 37, 0),
    Stb => ("stb", D, 38, 0),
    Stbu => ("stbu", D, 39, 0),
    Lhz => ("lhz", D, 40, 0),
    Lhzu => ("lhzu", D, 41, 0),
    Lha => ("lha", D, 42, 0),
    Lhau => ("lhau", D, 43, 0),
    Sth => ("sth", D, 44, 0),
    Sthu => ("sthu", D, 45, 0),
    Lmw => ("lmw", D, 46, 0),
    Stmw => ("stmw", D, 47, 0),
    Ld => ("ld", Ds, 58, 0),
    Ldu => ("ldu", Ds, 58, 1),
    Lwa => ("lwa", Ds, 58, 2),
    Std => ("std", Ds, 62, 0),
    Stdu => ("stdu", Ds, 62, 1),

    // -- Float load/store --
    Lfs => ("lfs", D, 48, 0),
    Lfsu => ("lfsu", D, 49, 0),
    Lfd => ("lfd", D, 50, 0),
    Lfdu => ("lfdu", D, 51, 0),
    Stfs => ("stfs", D, 52, 0),
    Stfsu => ("stfsu", D, 53, 0),
    Stfd => ("stfd", D, 54, 0),
    Stfdu => ("stfdu", D, 55, 0),

    // -- Float arithmetic, single (primary 59) --
    Fdivs => ("fdivs", A, 59, 18),
    Fsubs => ("fsubs", A, 59, 20),
    Fadds => ("fadds", A, 59, 21),
    Fsqrts => ("fsqrts", A, 59, 22),
    Fmuls => ("fmuls", A, 59, 25),
    Fmsubs => ("fmsubs", A, 59, 28),
    Fmadds => ("fmadds", A, 59, 29),

    // -- Float arithmetic, double (primary 63) --
    Fdiv => ("fdiv", A, 63, 18),
    Fsub => ("fsub", A, 63, 20),
    Fadd => ("fadd", A, 63, 21),
    Fsqrt => ("fsqrt", A, 63, 22),
    Fsel => ("fsel", A, 63, 23),
    Fmul => ("fmul", A, 63, 25),
    Fmsub => ("fmsub", A, 63, 28),
    Fmadd => ("fmadd", A, 63, 29),
    Fcmpu => ("fcmpu", X, 63, 0),
    Frsp => ("frsp", X, 63, 12),
    Fctiwz => ("fctiwz", X, 63, 15),
    Fcmpo => ("fcmpo", X, 63, 32),
    Mtfsb1 => ("mtfsb1", X, 63, 38),
    Fneg => ("fneg", X, 63, 40),
    Mtfsb0 => ("mtfsb0", X, 63, 70),
    Fmr => ("fmr", X, 63, 72),
    Fnabs => ("fnabs", X, 63, 136),
    Fabs => ("fabs", X, 63, 264),
    Mffs => ("mffs", X, 63, 583),
    Mtfsf => ("mtfsf", X, 63, 711),
    Fctidz => ("fctidz", X, 63, 815),
    Fcfid => ("fcfid", X, 63, 846),

    // -- Vector, VA-form --
    Vsel => ("vsel", Va, 4, 42),
    Vperm => ("vperm", Va, 4, 43),
    Vsldoi => ("vsldoi", Va, 4, 44),
    Vmaddfp => ("vmaddfp", Va, 4, 46),
    Vnmsubfp => ("vnmsubfp", Va, 4, 47),

    // -- Vector, VC-form --
    Vcmpequb => ("vcmpequb", Vc, 4, 6),
    Vcmpequh => ("vcmpequh", Vc, 4, 70),
    Vcmpequw => ("vcmpequw", Vc, 4, 134),
    Vcmpeqfp => ("vcmpeqfp", Vc, 4, 198),
    Vcmpgefp => ("vcmpgefp", Vc, 4, 454),
    Vcmpgtub => ("vcmpgtub", Vc, 4, 518),
    Vcmpgtuh => ("vcmpgtuh", Vc, 4, 582),
    Vcmpgtuw => ("vcmpgtuw", Vc, 4, 646),
    Vcmpgtfp => ("vcmpgtfp", Vc, 4, 710),
    Vcmpgtsb => ("vcmpgtsb", Vc, 4, 774),
    Vcmpgtsh => ("vcmpgtsh", Vc, 4, 838),
    Vcmpgtsw => ("vcmpgtsw", Vc, 4, 902),

    // -- Vector, VX-form --
    Vaddubm => ("vaddubm", Vx, 4, 0),
    Vmaxub => ("vmaxub", Vx, 4, 2),
    Vrlb => ("vrlb", Vx, 4, 4),
    Vaddfp => ("vaddfp", Vx, 4, 10),
    Vadduhm => ("vadduhm", Vx, 4, 64),
    Vmaxuh => ("vmaxuh", Vx, 4, 66),
    Vrlh => ("vrlh", Vx, 4, 68),
    Vsubfp => ("vsubfp", Vx, 4, 74),
    Vadduwm => ("vadduwm", Vx, 4, 128),
    Vmaxuw => ("vmaxuw", Vx, 4, 130),
    Vrlw => ("vrlw", Vx, 4, 132),
    Vmaxsb => ("vmaxsb", Vx, 4, 258),
    Vslb => ("vslb", Vx, 4, 260),
    Vmaxsh => ("vmaxsh", Vx, 4, 322),
    Vslh => ("vslh", Vx, 4, 324),
    Vmaxsw => ("vmaxsw", Vx, 4, 386),
    Vslw => ("vslw", Vx, 4, 388),
    Vaddubs => ("vaddubs", Vx, 4, 512),
    Vminub => ("vminub", Vx, 4, 514),
    Vsrb => ("vsrb", Vx, 4, 516),
    Vspltb => ("vspltb", Vx, 4, 524),
    Vadduhs => ("vadduhs", Vx, 4, 576),
    Vminuh => ("vminuh", Vx, 4, 578),
    Vsrh => ("vsrh", Vx, 4, 580),
    Vsplth => ("vsplth", Vx, 4, 588),
    Vadduws => ("vadduws", Vx, 4, 640),
    Vminuw => ("vminuw", Vx, 4, 642),
    Vsrw => ("vsrw", Vx, 4, 644),
    Vspltw => ("vspltw", Vx, 4, 652),
    Vaddsbs => ("vaddsbs", Vx, 4, 768),
    Vminsb => ("vminsb", Vx, 4, 770),
    Vsrab => ("vsrab", Vx, 4, 772),
    Vspltisb => ("vspltisb", Vx, 4, 780),
    Vaddshs => ("vaddshs", Vx, 4, 832),
    Vminsh => ("vminsh", Vx, 4, 834),
    Vsrah => ("vsrah", Vx, 4, 836),
    Vspltish => ("vspltish", Vx, 4, 844),
    Vaddsws => ("vaddsws", Vx, 4, 896),
    Vminsw => ("vminsw", Vx, 4, 898),
    Vsraw => ("vsraw", Vx, 4, 900),
    Vspltisw => ("vspltisw", Vx, 4, 908),
    Vsububm => ("vsububm", Vx, 4, 1024),
    Vand => ("vand", Vx, 4, 1028),
    Vsubuhm => ("vsubuhm", Vx, 4, 1088),
    Vandc => ("vandc", Vx, 4, 1092),
    Vsubuwm => ("vsubuwm", Vx, 4, 1152),
    Vor => ("vor", Vx, 4, 1156),
    Vxor => ("vxor", Vx, 4, 1220),
    Vnor => ("vnor", Vx, 4, 1284),
    Vsububs => ("vsububs", Vx, 4, 1536),
    Mfvscr => ("mfvscr", Vx, 4, 1540),
    Vsubuhs => ("vsubuhs", Vx, 4, 1600),
    Mtvscr => ("mtvscr", Vx, 4, 1604),
    Vsubuws => ("vsubuws", Vx, 4, 1664),
    Vsubsbs => ("vsubsbs", Vx, 4, 1792),
    Vsubshs => ("vsubshs", Vx, 4, 1856),
    Vsubsws => ("vsubsws", Vx, 4, 1920),
}

impl InsnClass {
    /// Number of recognized classes (excluding `Unknown`).
    pub const COUNT: usize = InsnClass::ALL.len();

    /// Dense index, `COUNT` for `Unknown`.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`InsnClass::index`].
    pub fn from_index(i: usize) -> InsnClass {
        InsnClass::ALL.get(i).copied().unwrap_or(InsnClass::Unknown)
    }

    /// Fixed-bit mask of this class.
    pub const fn mask(self) -> u32 {
        self.form().opcode_mask()
    }

    /// Whether this class may transfer control.
    pub const fn is_branch(self) -> bool {
        matches!(self, InsnClass::B | InsnClass::Bc | InsnClass::Bclr | InsnClass::Bcctr)
    }
}

impl std::fmt::Display for InsnClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
