//! Integer arithmetic, logical and shift lowering.

use ppujit_core::{Cond, Context, TempIdx, Type};
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::Insn;

use super::PpuDisasContext;

const I32: Type = Type::I32;
const I64: Type = Type::I64;

/// Signature shared by the `Context::gen_*` binary emitters.
pub(super) type BinOp = fn(&mut Context, Type, TempIdx, TempIdx, TempIdx) -> TempIdx;

/// `d = op(a, b)` into a fresh temp.
pub(super) fn emit(ir: &mut Context, ty: Type, op: BinOp, a: TempIdx, b: TempIdx) -> TempIdx {
    let d = ir.new_temp(ty);
    op(ir, ty, d, a, b)
}

impl PpuDisasContext<'_> {
    /// `x + y + ci` with `ci` a 0/1 value; returns the sum and the
    /// carry out as 0/1.
    fn gen_add3(
        &self,
        ir: &mut Context,
        x: TempIdx,
        y: TempIdx,
        ci: TempIdx,
    ) -> (TempIdx, TempIdx) {
        let t = emit(ir, I64, Context::gen_add, x, y);
        let c1 = ir.new_temp(I64);
        ir.gen_setcond(I64, c1, t, x, Cond::Ltu);
        let r = emit(ir, I64, Context::gen_add, t, ci);
        let c2 = ir.new_temp(I64);
        ir.gen_setcond(I64, c2, r, t, Cond::Ltu);
        let co = emit(ir, I64, Context::gen_or, c1, c2);
        (r, co)
    }

    fn gen_not64(&self, ir: &mut Context, a: TempIdx) -> TempIdx {
        let t = ir.new_temp(I64);
        ir.gen_not(I64, t, a)
    }

    /// Write `r` to GPR `n`, updating CR0 for record forms.
    fn gen_result(&self, ir: &mut Context, n: usize, r: TempIdx, record: bool) {
        self.gen_set_gpr(ir, n, r);
        if record {
            self.gen_set_cr0(ir, r);
        }
    }

    fn gen_low32(&self, ir: &mut Context, a: TempIdx, signed: bool) -> TempIdx {
        let t = ir.new_temp(I64);
        if signed {
            ir.gen_sextract(I64, t, a, 0, 32)
        } else {
            ir.gen_extract(I64, t, a, 0, 32)
        }
    }

    fn gen_trunc(&self, ir: &mut Context, a: TempIdx) -> TempIdx {
        let t = ir.new_temp(I32);
        ir.gen_extrl_i64_i32(t, a)
    }
}

// -- Immediate arithmetic -------------------------------------------

pub(super) fn addi(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let imm = match i.class {
        Addis => (i.simm() << 16) as u64,
        _ => i.simm() as u64,
    };
    let base = ctx.gpr_or_zero(ir, i.ra());
    let c = ctx.const64(ir, imm);
    let r = emit(ir, I64, Context::gen_add, base, c);
    ctx.gen_set_gpr(ir, i.rt(), r);
    true
}

/// addic, addic., subfic
pub(super) fn add_imm_carry(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let a = ctx.gpr(i.ra());
    let imm = ctx.const64(ir, i.simm() as u64);
    let (x, ci) = match i.class {
        Subfic => (ctx.gen_not64(ir, a), ctx.const64(ir, 1)),
        _ => (a, ctx.const64(ir, 0)),
    };
    let (r, ca) = ctx.gen_add3(ir, x, imm, ci);
    ctx.gen_set_ca(ir, ca);
    ctx.gen_result(ir, i.rt(), r, i.class == AddicRc);
    true
}

pub(super) fn mulli(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let c = ctx.const64(ir, i.simm() as u64);
    let r = emit(ir, I64, Context::gen_mul, ctx.gpr(i.ra()), c);
    ctx.gen_set_gpr(ir, i.rt(), r);
    true
}

// -- XO-form arithmetic ---------------------------------------------

/// add/subf and their carrying, extended and zero/minus-one forms.
/// Overflow-enabled forms go to the interpreter.
pub(super) fn add_family(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    if i.oe() {
        return false;
    }
    let a = ctx.gpr(i.ra());
    let b = ctx.gpr(i.rb());
    let r = match i.class {
        Add => emit(ir, I64, Context::gen_add, a, b),
        Subf => emit(ir, I64, Context::gen_sub, b, a),
        Neg => {
            let t = ir.new_temp(I64);
            ir.gen_neg(I64, t, a)
        }
        class => {
            let x = match class {
                Addc | Adde | Addze | Addme => a,
                _ => ctx.gen_not64(ir, a),
            };
            let y = match class {
                Addze | Subfze => ctx.const64(ir, 0),
                Addme | Subfme => ctx.const64(ir, u64::MAX),
                _ => b,
            };
            let ci = match class {
                Addc => ctx.const64(ir, 0),
                Subfc => ctx.const64(ir, 1),
                _ => ctx.gen_ca(ir),
            };
            let (r, ca) = ctx.gen_add3(ir, x, y, ci);
            ctx.gen_set_ca(ir, ca);
            r
        }
    };
    ctx.gen_result(ir, i.rt(), r, i.rc());
    true
}

pub(super) fn mul_family(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    if i.oe() && matches!(i.class, Mullw | Mulld) {
        return false;
    }
    let a = ctx.gpr(i.ra());
    let b = ctx.gpr(i.rb());
    let r = match i.class {
        Mullw => {
            let (sa, sb) = (ctx.gen_low32(ir, a, true), ctx.gen_low32(ir, b, true));
            emit(ir, I64, Context::gen_mul, sa, sb)
        }
        Mulld => emit(ir, I64, Context::gen_mul, a, b),
        Mulhw | Mulhwu => {
            let signed = i.class == Mulhw;
            let (xa, xb) = (ctx.gen_low32(ir, a, signed), ctx.gen_low32(ir, b, signed));
            let p = emit(ir, I64, Context::gen_mul, xa, xb);
            let c32 = ctx.const64(ir, 32);
            let shift: BinOp = if signed {
                Context::gen_sar
            } else {
                Context::gen_shr
            };
            emit(ir, I64, shift, p, c32)
        }
        Mulhd => emit(ir, I64, Context::gen_mulsh, a, b),
        _ => emit(ir, I64, Context::gen_muluh, a, b),
    };
    ctx.gen_result(ir, i.rt(), r, i.rc());
    true
}

/// Division by zero (and the overflowing signed quotient) yields 0.
pub(super) fn div_family(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    if i.oe() {
        return false;
    }
    let a = ctx.gpr(i.ra());
    let b = ctx.gpr(i.rb());
    let r = match i.class {
        Divw | Divwu => {
            let (a32, b32) = (ctx.gen_trunc(ir, a), ctx.gen_trunc(ir, b));
            let op: BinOp = if i.class == Divw {
                Context::gen_divs
            } else {
                Context::gen_divu
            };
            let q = emit(ir, I32, op, a32, b32);
            let r = ir.new_temp(I64);
            ir.gen_ext_u32_i64(r, q)
        }
        Divd => emit(ir, I64, Context::gen_divs, a, b),
        _ => emit(ir, I64, Context::gen_divu, a, b),
    };
    ctx.gen_result(ir, i.rt(), r, i.rc());
    true
}

// -- Logical ----------------------------------------------------------

pub(super) fn logical(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let op: BinOp = match i.class {
        And => Context::gen_and,
        Andc => Context::gen_andc,
        Or => Context::gen_or,
        Orc => Context::gen_orc,
        Xor => Context::gen_xor,
        Nor => Context::gen_nor,
        Nand => Context::gen_nand,
        _ => Context::gen_eqv,
    };
    let r = emit(ir, I64, op, ctx.gpr(i.rs()), ctx.gpr(i.rb()));
    ctx.gen_result(ir, i.ra(), r, i.rc());
    true
}

pub(super) fn logical_imm(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let u = i.uimm();
    let (op, imm): (BinOp, u64) = match i.class {
        AndiRc => (Context::gen_and, u),
        AndisRc => (Context::gen_and, u << 16),
        Ori => (Context::gen_or, u),
        Oris => (Context::gen_or, u << 16),
        Xori => (Context::gen_xor, u),
        _ => (Context::gen_xor, u << 16),
    };
    let c = ctx.const64(ir, imm);
    let r = emit(ir, I64, op, ctx.gpr(i.rs()), c);
    ctx.gen_result(ir, i.ra(), r, matches!(i.class, AndiRc | AndisRc));
    true
}

/// Sign extensions and leading-zero counts.
pub(super) fn unary(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let s = ctx.gpr(i.rs());
    let r = ir.new_temp(I64);
    match i.class {
        Extsb => ir.gen_sextract(I64, r, s, 0, 8),
        Extsh => ir.gen_sextract(I64, r, s, 0, 16),
        Extsw => ir.gen_sextract(I64, r, s, 0, 32),
        Cntlzw => {
            let s32 = ctx.gen_trunc(ir, s);
            let n = ir.new_temp(I32);
            ir.gen_clz(I32, n, s32);
            ir.gen_ext_u32_i64(r, n)
        }
        _ => ir.gen_clz(I64, r, s),
    };
    ctx.gen_result(ir, i.ra(), r, i.rc());
    true
}

// -- Shifts -----------------------------------------------------------

impl PpuDisasContext<'_> {
    /// CA for an arithmetic right shift: the source is negative and
    /// a one bit was shifted out of `src & lost_mask`.
    fn gen_sra_carry(
        &self,
        ir: &mut Context,
        signed_src: TempIdx,
        bits: TempIdx,
        lost_mask: TempIdx,
    ) {
        let zero = self.const64(ir, 0);
        let lost = emit(ir, I64, Context::gen_and, bits, lost_mask);
        let nz = ir.new_temp(I64);
        ir.gen_setcond(I64, nz, lost, zero, Cond::Ne);
        let neg = ir.new_temp(I64);
        ir.gen_setcond(I64, neg, signed_src, zero, Cond::Lt);
        let ca = emit(ir, I64, Context::gen_and, neg, nz);
        self.gen_set_ca(ir, ca);
    }
}

pub(super) fn shift(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let s = ctx.gpr(i.rs());
    let b = ctx.gpr(i.rb());
    let r = match i.class {
        Slw | Srw => {
            let s32 = ctx.gen_trunc(ir, s);
            let m = ctx.const64(ir, 0x3F);
            let n = emit(ir, I64, Context::gen_and, b, m);
            let n32 = ctx.gen_trunc(ir, n);
            let op: BinOp = if i.class == Slw {
                Context::gen_shl
            } else {
                Context::gen_shr
            };
            let sh = emit(ir, I32, op, s32, n32);
            let c31 = ir.new_const(I32, 31);
            let zero = ir.new_const(I32, 0);
            let r32 = ir.new_temp(I32);
            ir.gen_movcond(I32, r32, n32, c31, zero, sh, Cond::Gtu);
            let r = ir.new_temp(I64);
            ir.gen_ext_u32_i64(r, r32)
        }
        Sraw | Srawi => {
            let s32 = ctx.gen_trunc(ir, s);
            let (n32, mask) = if i.class == Srawi {
                let n = i.sh32();
                (ir.new_const(I32, n as u64), ctx.const64(ir, (1u64 << n) - 1))
            } else {
                let m = ctx.const64(ir, 0x3F);
                let n = emit(ir, I64, Context::gen_and, b, m);
                let n32 = ctx.gen_trunc(ir, n);
                let c31 = ir.new_const(I32, 31);
                let clamped = ir.new_temp(I32);
                ir.gen_movcond(I32, clamped, n32, c31, c31, n32, Cond::Gtu);
                // (1 << n) - 1 with n < 64 covers the whole low word
                // once n exceeds 31.
                let one = ctx.const64(ir, 1);
                let p = emit(ir, I64, Context::gen_shl, one, n);
                (clamped, emit(ir, I64, Context::gen_sub, p, one))
            };
            let r32 = emit(ir, I32, Context::gen_sar, s32, n32);
            let sx = ctx.gen_low32(ir, s, true);
            let zx = ctx.gen_low32(ir, s, false);
            ctx.gen_sra_carry(ir, sx, zx, mask);
            let r = ir.new_temp(I64);
            ir.gen_ext_i32_i64(r, r32)
        }
        Sld | Srd => {
            let m = ctx.const64(ir, 0x7F);
            let n = emit(ir, I64, Context::gen_and, b, m);
            let op: BinOp = if i.class == Sld {
                Context::gen_shl
            } else {
                Context::gen_shr
            };
            let sh = emit(ir, I64, op, s, n);
            let c63 = ctx.const64(ir, 63);
            let zero = ctx.const64(ir, 0);
            let r = ir.new_temp(I64);
            ir.gen_movcond(I64, r, n, c63, zero, sh, Cond::Gtu)
        }
        _ => {
            let (n, mask) = if i.class == Sradi {
                let n = i.sh64();
                let mask = ((1u128 << n) - 1) as u64;
                (ctx.const64(ir, n as u64), ctx.const64(ir, mask))
            } else {
                let m = ctx.const64(ir, 0x7F);
                let n = emit(ir, I64, Context::gen_and, b, m);
                let c63 = ctx.const64(ir, 63);
                let clamped = ir.new_temp(I64);
                ir.gen_movcond(I64, clamped, n, c63, c63, n, Cond::Gtu);
                let one = ctx.const64(ir, 1);
                let p = emit(ir, I64, Context::gen_shl, one, clamped);
                let low = emit(ir, I64, Context::gen_sub, p, one);
                let ones = ctx.const64(ir, u64::MAX);
                let mask = ir.new_temp(I64);
                ir.gen_movcond(I64, mask, n, c63, ones, low, Cond::Gtu);
                (clamped, mask)
            };
            let r = emit(ir, I64, Context::gen_sar, s, n);
            ctx.gen_sra_carry(ir, s, s, mask);
            r
        }
    };
    ctx.gen_result(ir, i.ra(), r, i.rc());
    true
}
