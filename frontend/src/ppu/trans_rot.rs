//! Rotate-and-mask lowering.

use ppujit_core::{Context, Type};
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::Insn;
use ppujit_guest::interp::rotate_mask;

use super::trans_int::emit;
use super::PpuDisasContext;

const I32: Type = Type::I32;
const I64: Type = Type::I64;

/// rlwinm, rlwnm, rlwimi: rotate the low word (replicated into both
/// halves) and mask.
pub(super) fn rotate32(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let s = ctx.gpr(i.rs());
    let s32 = ir.new_temp(I32);
    ir.gen_extrl_i64_i32(s32, s);
    let n32 = if i.class == Rlwnm {
        let b32 = ir.new_temp(I32);
        ir.gen_extrl_i64_i32(b32, ctx.gpr(i.rb()));
        let m = ir.new_const(I32, 0x1F);
        emit(ir, I32, Context::gen_and, b32, m)
    } else {
        ir.new_const(I32, i.sh32() as u64)
    };
    let r32 = emit(ir, I32, Context::gen_rotl, s32, n32);
    let mut rot = ir.new_temp(I64);
    ir.gen_ext_u32_i64(rot, r32);

    let m = rotate_mask(i.mb32() + 32, i.me32() + 32);
    if m >> 32 != 0 {
        let c32 = ctx.const64(ir, 32);
        let hi = emit(ir, I64, Context::gen_shl, rot, c32);
        rot = emit(ir, I64, Context::gen_or, rot, hi);
    }
    let mc = ctx.const64(ir, m);
    let mut r = emit(ir, I64, Context::gen_and, rot, mc);
    if i.class == Rlwimi {
        let keep = ctx.const64(ir, !m);
        let old = emit(ir, I64, Context::gen_and, ctx.gpr(i.ra()), keep);
        r = emit(ir, I64, Context::gen_or, r, old);
    }
    ctx.gen_set_gpr(ir, i.ra(), r);
    if i.rc() {
        ctx.gen_set_cr0(ir, r);
    }
    true
}

/// rldicl, rldicr, rldic, rldimi, rldcl, rldcr.
pub(super) fn rotate64(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let s = ctx.gpr(i.rs());
    let mb = i.mb64();
    let m = match i.class {
        Rldicl | Rldcl => rotate_mask(mb, 63),
        Rldicr | Rldcr => rotate_mask(0, mb),
        _ => rotate_mask(mb, 63 - i.sh64()),
    };
    let n = if matches!(i.class, Rldcl | Rldcr) {
        let c = ctx.const64(ir, 0x3F);
        emit(ir, I64, Context::gen_and, ctx.gpr(i.rb()), c)
    } else {
        ctx.const64(ir, i.sh64() as u64)
    };
    let rot = emit(ir, I64, Context::gen_rotl, s, n);
    let mc = ctx.const64(ir, m);
    let mut r = emit(ir, I64, Context::gen_and, rot, mc);
    if i.class == Rldimi {
        let keep = ctx.const64(ir, !m);
        let old = emit(ir, I64, Context::gen_and, ctx.gpr(i.ra()), keep);
        r = emit(ir, I64, Context::gen_or, r, old);
    }
    ctx.gen_set_gpr(ir, i.ra(), r);
    if i.rc() {
        ctx.gen_set_cr0(ir, r);
    }
    true
}
