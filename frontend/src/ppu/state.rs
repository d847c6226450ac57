//! Guest register globals and the accessors lowering code goes
//! through to read and write them.

use ppujit_core::{Cond, Context, TempIdx, Type};
use ppujit_guest::cpu::{
    fpr_offset, gpr_offset, sprg_offset, vr_offset, OFFSET_CR, OFFSET_CTR, OFFSET_FPSCR,
    OFFSET_LR, OFFSET_PC, OFFSET_TB, OFFSET_VRSAVE, OFFSET_VSCR, OFFSET_XER,
};

use super::PpuDisasContext;

const GPR_NAMES: [&str; 32] = [
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
    "r14", "r15", "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23", "r24", "r25", "r26",
    "r27", "r28", "r29", "r30", "r31",
];
const FPR_NAMES: [&str; 32] = [
    "f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12", "f13",
    "f14", "f15", "f16", "f17", "f18", "f19", "f20", "f21", "f22", "f23", "f24", "f25", "f26",
    "f27", "f28", "f29", "f30", "f31",
];
const VR_NAMES: [&str; 32] = [
    "v0", "v1", "v2", "v3", "v4", "v5", "v6", "v7", "v8", "v9", "v10", "v11", "v12", "v13",
    "v14", "v15", "v16", "v17", "v18", "v19", "v20", "v21", "v22", "v23", "v24", "v25", "v26",
    "v27", "v28", "v29", "v30", "v31",
];
const SPRG_NAMES: [&str; 4] = ["sprg0", "sprg1", "sprg2", "sprg3"];

/// IR globals for every guest register.
#[derive(Debug, Clone, Copy)]
pub struct Regs {
    pub gpr: [TempIdx; 32],
    pub fpr: [TempIdx; 32],
    pub vr: [TempIdx; 32],
    pub pc: TempIdx,
    pub lr: TempIdx,
    pub ctr: TempIdx,
    pub xer: TempIdx,
    pub cr: TempIdx,
    pub fpscr: TempIdx,
    pub vscr: TempIdx,
    pub vrsave: TempIdx,
    pub tb: TempIdx,
    pub sprg: [TempIdx; 4],
}

/// Number of globals [`Regs::bind`] registers.
pub const NUM_GLOBALS: u32 = 32 * 3 + 9 + 4;

impl Regs {
    /// Placeholder until [`Regs::bind`] runs.
    pub fn unbound() -> Self {
        let z = TempIdx(0);
        Self {
            gpr: [z; 32],
            fpr: [z; 32],
            vr: [z; 32],
            pc: z,
            lr: z,
            ctr: z,
            xer: z,
            cr: z,
            fpscr: z,
            vscr: z,
            vrsave: z,
            tb: z,
            sprg: [z; 4],
        }
    }

    /// Bind the register globals of `ir`, registering them on first
    /// use. Globals survive [`Context::reset`], so later units reuse
    /// them by position.
    pub fn bind(ir: &mut Context) -> Self {
        if ir.nb_globals() == 0 {
            Self::register(ir);
        }
        debug_assert_eq!(ir.nb_globals(), NUM_GLOBALS);
        let at = |i: usize| TempIdx(i as u32);
        Self {
            gpr: std::array::from_fn(at),
            fpr: std::array::from_fn(|i| at(32 + i)),
            vr: std::array::from_fn(|i| at(64 + i)),
            pc: at(96),
            lr: at(97),
            ctr: at(98),
            xer: at(99),
            cr: at(100),
            fpscr: at(101),
            vscr: at(102),
            vrsave: at(103),
            tb: at(104),
            sprg: std::array::from_fn(|i| at(105 + i)),
        }
    }

    fn register(ir: &mut Context) {
        for (i, name) in GPR_NAMES.iter().enumerate() {
            ir.new_global(Type::I64, gpr_offset(i), name);
        }
        for (i, name) in FPR_NAMES.iter().enumerate() {
            ir.new_global(Type::I64, fpr_offset(i), name);
        }
        for (i, name) in VR_NAMES.iter().enumerate() {
            ir.new_global(Type::V128, vr_offset(i), name);
        }
        ir.new_global(Type::I64, OFFSET_PC, "pc");
        ir.new_global(Type::I64, OFFSET_LR, "lr");
        ir.new_global(Type::I64, OFFSET_CTR, "ctr");
        ir.new_global(Type::I64, OFFSET_XER, "xer");
        ir.new_global(Type::I32, OFFSET_CR, "cr");
        ir.new_global(Type::I32, OFFSET_FPSCR, "fpscr");
        ir.new_global(Type::I32, OFFSET_VSCR, "vscr");
        ir.new_global(Type::I32, OFFSET_VRSAVE, "vrsave");
        ir.new_global(Type::I64, OFFSET_TB, "tb");
        for (i, name) in SPRG_NAMES.iter().enumerate() {
            ir.new_global(Type::I64, sprg_offset(i), name);
        }
    }
}

// XER bit positions (counted from the least significant bit).
const XER_SO_BIT: u32 = 31;
const XER_CA_BIT: u32 = 29;

impl PpuDisasContext<'_> {
    // -- GPR access ---------------------------------------------

    pub(super) fn gpr(&self, n: usize) -> TempIdx {
        self.regs.gpr[n]
    }

    /// `(ra|0)`: register 0 reads as zero in address arithmetic.
    pub(super) fn gpr_or_zero(&self, ir: &mut Context, n: usize) -> TempIdx {
        if n == 0 {
            ir.new_const(Type::I64, 0)
        } else {
            self.regs.gpr[n]
        }
    }

    pub(super) fn gen_set_gpr(&self, ir: &mut Context, n: usize, val: TempIdx) {
        ir.gen_mov(Type::I64, self.regs.gpr[n], val);
    }

    pub(super) fn const64(&self, ir: &mut Context, val: u64) -> TempIdx {
        ir.new_const(Type::I64, val)
    }

    // -- PC -----------------------------------------------------

    pub(super) fn gen_set_pc(&self, ir: &mut Context, pc: u32) {
        let c = ir.new_const(Type::I64, pc as u64);
        ir.gen_mov(Type::I64, self.regs.pc, c);
    }

    // -- CR access ----------------------------------------------

    /// CR bit `bi` (0 is the most significant) as 0/1.
    pub(super) fn gen_cr_bit(&self, ir: &mut Context, bi: u32) -> TempIdx {
        let t = ir.new_temp(Type::I32);
        ir.gen_extract(Type::I32, t, self.regs.cr, 31 - bi, 1)
    }

    /// Store bit 0 of `val` into CR bit `bi`.
    pub(super) fn gen_set_cr_bit(&self, ir: &mut Context, bi: u32, val: TempIdx) {
        let cr = self.regs.cr;
        ir.gen_deposit(Type::I32, cr, cr, val, 31 - bi, 1);
    }

    pub(super) fn gen_cr_field(&self, ir: &mut Context, n: u32) -> TempIdx {
        let t = ir.new_temp(Type::I32);
        ir.gen_extract(Type::I32, t, self.regs.cr, (7 - n) * 4, 4)
    }

    pub(super) fn gen_set_cr_field(&self, ir: &mut Context, n: u32, val: TempIdx) {
        let cr = self.regs.cr;
        ir.gen_deposit(Type::I32, cr, cr, val, (7 - n) * 4, 4);
    }

    /// 4-bit compare result of `a` against `b` (both I64) with the
    /// summary-overflow copy in bit 0.
    pub(super) fn gen_cmp_field(
        &self,
        ir: &mut Context,
        a: TempIdx,
        b: TempIdx,
        signed: bool,
    ) -> TempIdx {
        let (lt_c, gt_c) = if signed {
            (Cond::Lt, Cond::Gt)
        } else {
            (Cond::Ltu, Cond::Gtu)
        };
        let lt = ir.new_temp(Type::I64);
        let gt = ir.new_temp(Type::I64);
        let eq = ir.new_temp(Type::I64);
        ir.gen_setcond(Type::I64, lt, a, b, lt_c);
        ir.gen_setcond(Type::I64, gt, a, b, gt_c);
        ir.gen_setcond(Type::I64, eq, a, b, Cond::Eq);

        let f = ir.new_temp(Type::I64);
        let t = ir.new_temp(Type::I64);
        let c3 = ir.new_const(Type::I64, 3);
        let c2 = ir.new_const(Type::I64, 2);
        let c1 = ir.new_const(Type::I64, 1);
        ir.gen_shl(Type::I64, f, lt, c3);
        ir.gen_shl(Type::I64, t, gt, c2);
        ir.gen_or(Type::I64, f, f, t);
        let t = ir.new_temp(Type::I64);
        ir.gen_shl(Type::I64, t, eq, c1);
        ir.gen_or(Type::I64, f, f, t);
        let so = self.gen_so(ir);
        ir.gen_or(Type::I64, f, f, so);

        let f32 = ir.new_temp(Type::I32);
        ir.gen_extrl_i64_i32(f32, f)
    }

    /// Record form: CR0 from a signed compare of `r` with zero.
    pub(super) fn gen_set_cr0(&self, ir: &mut Context, r: TempIdx) {
        let zero = ir.new_const(Type::I64, 0);
        let f = self.gen_cmp_field(ir, r, zero, true);
        self.gen_set_cr_field(ir, 0, f);
    }

    // -- XER access ---------------------------------------------

    /// XER[SO] as 0/1 (I64).
    pub(super) fn gen_so(&self, ir: &mut Context) -> TempIdx {
        let t = ir.new_temp(Type::I64);
        ir.gen_extract(Type::I64, t, self.regs.xer, XER_SO_BIT, 1)
    }

    /// XER[CA] as 0/1 (I64).
    pub(super) fn gen_ca(&self, ir: &mut Context) -> TempIdx {
        let t = ir.new_temp(Type::I64);
        ir.gen_extract(Type::I64, t, self.regs.xer, XER_CA_BIT, 1)
    }

    pub(super) fn gen_set_ca(&self, ir: &mut Context, ca: TempIdx) {
        let xer = self.regs.xer;
        ir.gen_deposit(Type::I64, xer, xer, ca, XER_CA_BIT, 1);
    }
}
