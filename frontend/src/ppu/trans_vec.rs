//! Integer vector lowering.
//!
//! Lane order follows the guest: lane 0 is the most significant
//! element of the 128-bit value. Saturating forms compare the
//! saturated result with the wrapped one to set VSCR[SAT].

use ppujit_core::{Cond, Context, TempIdx, Type, Vece};
use ppujit_decode::class::InsnClass::{self, *};
use ppujit_decode::Insn;

use super::trans_int::{emit, BinOp};
use super::PpuDisasContext;

const V128: Type = Type::V128;

/// Signature shared by the `Context::gen_*_vec` lane emitters.
type VecOp = fn(&mut Context, Vece, TempIdx, TempIdx, TempIdx) -> TempIdx;

fn vemit(ir: &mut Context, vece: Vece, op: VecOp, a: TempIdx, b: TempIdx) -> TempIdx {
    let d = ir.new_temp(V128);
    op(ir, vece, d, a, b)
}

pub(super) fn vsel(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let vr = ctx.regs.vr;
    let r = ir.new_temp(V128);
    ir.gen_bitsel_vec(r, vr[i.vc()], vr[i.vb()], vr[i.va()]);
    ir.gen_mov(V128, vr[i.vd()], r);
    true
}

pub(super) fn logical(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let op: BinOp = match i.class {
        Vand => Context::gen_and,
        Vandc => Context::gen_andc,
        Vor => Context::gen_or,
        Vxor => Context::gen_xor,
        Vnor => Context::gen_nor,
        _ => return false,
    };
    let vr = ctx.regs.vr;
    let r = emit(ir, V128, op, vr[i.va()], vr[i.vb()]);
    ir.gen_mov(V128, vr[i.vd()], r);
    true
}

/// (lane op, element size, wrapping counterpart for SAT detection)
fn lane_op(class: InsnClass) -> Option<(VecOp, Vece, Option<VecOp>)> {
    use Vece::*;
    let add: VecOp = Context::gen_add_vec;
    let sub: VecOp = Context::gen_sub_vec;
    Some(match class {
        Vaddubm => (add, B8, None),
        Vadduhm => (add, H16, None),
        Vadduwm => (add, W32, None),
        Vsububm => (sub, B8, None),
        Vsubuhm => (sub, H16, None),
        Vsubuwm => (sub, W32, None),
        Vaddubs => (Context::gen_usadd_vec, B8, Some(add)),
        Vadduhs => (Context::gen_usadd_vec, H16, Some(add)),
        Vadduws => (Context::gen_usadd_vec, W32, Some(add)),
        Vaddsbs => (Context::gen_ssadd_vec, B8, Some(add)),
        Vaddshs => (Context::gen_ssadd_vec, H16, Some(add)),
        Vaddsws => (Context::gen_ssadd_vec, W32, Some(add)),
        Vsububs => (Context::gen_ussub_vec, B8, Some(sub)),
        Vsubuhs => (Context::gen_ussub_vec, H16, Some(sub)),
        Vsubuws => (Context::gen_ussub_vec, W32, Some(sub)),
        Vsubsbs => (Context::gen_sssub_vec, B8, Some(sub)),
        Vsubshs => (Context::gen_sssub_vec, H16, Some(sub)),
        Vsubsws => (Context::gen_sssub_vec, W32, Some(sub)),
        Vmaxub => (Context::gen_umax_vec, B8, None),
        Vmaxuh => (Context::gen_umax_vec, H16, None),
        Vmaxuw => (Context::gen_umax_vec, W32, None),
        Vmaxsb => (Context::gen_smax_vec, B8, None),
        Vmaxsh => (Context::gen_smax_vec, H16, None),
        Vmaxsw => (Context::gen_smax_vec, W32, None),
        Vminub => (Context::gen_umin_vec, B8, None),
        Vminuh => (Context::gen_umin_vec, H16, None),
        Vminuw => (Context::gen_umin_vec, W32, None),
        Vminsb => (Context::gen_smin_vec, B8, None),
        Vminsh => (Context::gen_smin_vec, H16, None),
        Vminsw => (Context::gen_smin_vec, W32, None),
        Vrlb => (Context::gen_rotlv_vec, B8, None),
        Vrlh => (Context::gen_rotlv_vec, H16, None),
        Vrlw => (Context::gen_rotlv_vec, W32, None),
        Vslb => (Context::gen_shlv_vec, B8, None),
        Vslh => (Context::gen_shlv_vec, H16, None),
        Vslw => (Context::gen_shlv_vec, W32, None),
        Vsrb => (Context::gen_shrv_vec, B8, None),
        Vsrh => (Context::gen_shrv_vec, H16, None),
        Vsrw => (Context::gen_shrv_vec, W32, None),
        Vsrab => (Context::gen_sarv_vec, B8, None),
        Vsrah => (Context::gen_sarv_vec, H16, None),
        Vsraw => (Context::gen_sarv_vec, W32, None),
        _ => return None,
    })
}

pub(super) fn int_arith(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let Some((op, vece, wrapping)) = lane_op(i.class) else {
        return false;
    };
    let vr = ctx.regs.vr;
    let (a, b) = (vr[i.va()], vr[i.vb()]);
    let r = vemit(ir, vece, op, a, b);
    if let Some(wrap) = wrapping {
        let w = vemit(ir, vece, wrap, a, b);
        let sat = ir.new_temp(Type::I32);
        ir.gen_setcond(V128, sat, r, w, Cond::Ne);
        let vscr = ctx.regs.vscr;
        ir.gen_or(Type::I32, vscr, vscr, sat);
    }
    ir.gen_mov(V128, vr[i.vd()], r);
    true
}

pub(super) fn int_compare(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let (vece, cond) = match i.class {
        Vcmpequb => (Vece::B8, Cond::Eq),
        Vcmpequh => (Vece::H16, Cond::Eq),
        Vcmpequw => (Vece::W32, Cond::Eq),
        Vcmpgtub => (Vece::B8, Cond::Gtu),
        Vcmpgtuh => (Vece::H16, Cond::Gtu),
        Vcmpgtuw => (Vece::W32, Cond::Gtu),
        Vcmpgtsb => (Vece::B8, Cond::Gt),
        Vcmpgtsh => (Vece::H16, Cond::Gt),
        Vcmpgtsw => (Vece::W32, Cond::Gt),
        _ => return false,
    };
    let vr = ctx.regs.vr;
    let r = ir.new_temp(V128);
    ir.gen_cmp_vec(vece, r, vr[i.va()], vr[i.vb()], cond);
    ir.gen_mov(V128, vr[i.vd()], r);

    if i.vrc() {
        // CR6 = all-true << 3 | all-false << 1
        let ones = ir.new_const_wide(V128, u128::MAX);
        let zero = ir.new_const_wide(V128, 0);
        let all = ir.new_temp(Type::I32);
        let none = ir.new_temp(Type::I32);
        ir.gen_setcond(V128, all, r, ones, Cond::Eq);
        ir.gen_setcond(V128, none, r, zero, Cond::Eq);
        let c3 = ir.new_const(Type::I32, 3);
        let c1 = ir.new_const(Type::I32, 1);
        let hi = emit(ir, Type::I32, Context::gen_shl, all, c3);
        let lo = emit(ir, Type::I32, Context::gen_shl, none, c1);
        let f = emit(ir, Type::I32, Context::gen_or, hi, lo);
        ctx.gen_set_cr_field(ir, 6, f);
    }
    true
}

pub(super) fn splat(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let vece = match i.class {
        Vspltb => Vece::B8,
        Vsplth => Vece::H16,
        _ => Vece::W32,
    };
    let lane = i.vuimm() % vece.lanes();
    let vr = ctx.regs.vr;
    let x = ir.new_temp(Type::I64);
    ir.gen_extract_vec(vece, x, vr[i.vb()], lane);
    let r = ir.new_temp(V128);
    ir.gen_dup_vec(vece, r, x);
    ir.gen_mov(V128, vr[i.vd()], r);
    true
}

pub(super) fn splat_imm(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let vece = match i.class {
        Vspltisb => Vece::B8,
        Vspltish => Vece::H16,
        _ => Vece::W32,
    };
    let x = ir.new_const(Type::I64, i.vsimm() as i64 as u64);
    let r = ir.new_temp(V128);
    ir.gen_dup_vec(vece, r, x);
    ir.gen_mov(V128, ctx.regs.vr[i.vd()], r);
    true
}
