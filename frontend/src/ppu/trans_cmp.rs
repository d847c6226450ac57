//! Compares, CR logical operations and special-register moves.

use ppujit_core::{Context, Type};
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::fields::spr;
use ppujit_decode::Insn;
use ppujit_guest::cpu::xer;

use super::trans_int::{emit, BinOp};
use super::PpuDisasContext;

const I32: Type = Type::I32;
const I64: Type = Type::I64;

pub(super) fn compare(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let signed = matches!(i.class, Cmp | Cmpi);
    let wide = i.cmp_l();
    let a = ctx.gpr(i.ra());
    let a = if wide {
        a
    } else {
        let t = ir.new_temp(I64);
        if signed {
            ir.gen_sextract(I64, t, a, 0, 32)
        } else {
            ir.gen_extract(I64, t, a, 0, 32)
        }
    };
    let b = match i.class {
        Cmpi if wide => ctx.const64(ir, i.simm() as u64),
        Cmpi => ctx.const64(ir, i.simm() as i32 as i64 as u64),
        Cmpli => ctx.const64(ir, i.uimm()),
        _ => {
            let b = ctx.gpr(i.rb());
            if wide {
                b
            } else {
                let t = ir.new_temp(I64);
                if signed {
                    ir.gen_sextract(I64, t, b, 0, 32)
                } else {
                    ir.gen_extract(I64, t, b, 0, 32)
                }
            }
        }
    };
    let f = ctx.gen_cmp_field(ir, a, b, signed);
    ctx.gen_set_cr_field(ir, i.crfd(), f);
    true
}

pub(super) fn cr_logical(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let op: BinOp = match i.class {
        Crand => Context::gen_and,
        Cror => Context::gen_or,
        Crxor => Context::gen_xor,
        Crnand => Context::gen_nand,
        Crnor => Context::gen_nor,
        Creqv => Context::gen_eqv,
        Crandc => Context::gen_andc,
        _ => Context::gen_orc,
    };
    let a = ctx.gen_cr_bit(ir, i.crba());
    let b = ctx.gen_cr_bit(ir, i.crbb());
    let r = emit(ir, I32, op, a, b);
    ctx.gen_set_cr_bit(ir, i.crbd(), r);
    true
}

pub(super) fn mcrf(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let f = ctx.gen_cr_field(ir, i.crfs());
    ctx.gen_set_cr_field(ir, i.crfd(), f);
    true
}

pub(super) fn mfcr(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let r = ir.new_temp(I64);
    ir.gen_ext_u32_i64(r, ctx.regs.cr);
    ctx.gen_set_gpr(ir, i.rt(), r);
    true
}

pub(super) fn mtcrf(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let mask = (0..8u32)
        .filter(|f| i.crm() & (0x80 >> f) != 0)
        .fold(0u32, |m, f| m | (0xF << ((7 - f) * 4)));
    let s32 = ir.new_temp(I32);
    ir.gen_extrl_i64_i32(s32, ctx.gpr(i.rs()));
    let keep = ir.new_const(I32, !mask as u64);
    let take = ir.new_const(I32, mask as u64);
    let old = emit(ir, I32, Context::gen_and, ctx.regs.cr, keep);
    let new = emit(ir, I32, Context::gen_and, s32, take);
    ir.gen_or(I32, ctx.regs.cr, old, new);
    true
}

/// Unknown SPR numbers go to the interpreter, which halts on them.
pub(super) fn mfspr(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let src = match i.spr() {
        spr::XER => ctx.regs.xer,
        spr::LR => ctx.regs.lr,
        spr::CTR => ctx.regs.ctr,
        spr::VRSAVE => {
            let r = ir.new_temp(I64);
            ir.gen_ext_u32_i64(r, ctx.regs.vrsave);
            ctx.gen_set_gpr(ir, i.rt(), r);
            return true;
        }
        n @ spr::SPRG0..=spr::SPRG3 => ctx.regs.sprg[(n - spr::SPRG0) as usize],
        _ => return false,
    };
    ctx.gen_set_gpr(ir, i.rt(), src);
    true
}

pub(super) fn mtspr(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let v = ctx.gpr(i.rs());
    match i.spr() {
        spr::XER => {
            let m = ctx.const64(ir, xer::MASK);
            ir.gen_and(I64, ctx.regs.xer, v, m);
        }
        spr::LR => {
            ir.gen_mov(I64, ctx.regs.lr, v);
        }
        spr::CTR => {
            ir.gen_mov(I64, ctx.regs.ctr, v);
        }
        spr::VRSAVE => {
            ir.gen_extrl_i64_i32(ctx.regs.vrsave, v);
        }
        n @ spr::SPRG0..=spr::SPRG3 => {
            ir.gen_mov(I64, ctx.regs.sprg[(n - spr::SPRG0) as usize], v);
        }
        _ => return false,
    }
    true
}
