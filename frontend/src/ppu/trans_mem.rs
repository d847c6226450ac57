//! Load/store lowering.

use ppujit_core::{Context, TempIdx, Type};
use ppujit_decode::class::InsnClass::{self, *};
use ppujit_decode::Insn;

use super::PpuDisasContext;

const I32: Type = Type::I32;
const I64: Type = Type::I64;

/// Shape of a scalar access.
#[derive(Debug, Clone, Copy)]
struct Access {
    bytes: u32,
    signed: bool,
    update: bool,
    indexed: bool,
    reversed: bool,
    /// DS-form displacement.
    ds: bool,
}

const fn acc(bytes: u32, update: bool, indexed: bool) -> Access {
    Access {
        bytes,
        signed: false,
        update,
        indexed,
        reversed: false,
        ds: false,
    }
}

const fn signed(a: Access) -> Access {
    Access { signed: true, ..a }
}

const fn ds(a: Access) -> Access {
    Access { ds: true, ..a }
}

const fn reversed(a: Access) -> Access {
    Access { reversed: true, ..a }
}

fn access_of(class: InsnClass) -> Option<Access> {
    Some(match class {
        Lbz | Stb => acc(1, false, false),
        Lbzu | Stbu => acc(1, true, false),
        Lbzx | Stbx => acc(1, false, true),
        Lbzux | Stbux => acc(1, true, true),
        Lhz | Sth => acc(2, false, false),
        Lhzu | Sthu => acc(2, true, false),
        Lhzx | Sthx => acc(2, false, true),
        Lhzux | Sthux => acc(2, true, true),
        Lha => signed(acc(2, false, false)),
        Lhau => signed(acc(2, true, false)),
        Lhax => signed(acc(2, false, true)),
        Lhaux => signed(acc(2, true, true)),
        Lwz | Stw => acc(4, false, false),
        Lwzu | Stwu => acc(4, true, false),
        Lwzx | Stwx => acc(4, false, true),
        Lwzux | Stwux => acc(4, true, true),
        Lwa => signed(ds(acc(4, false, false))),
        Lwax => signed(acc(4, false, true)),
        Lwaux => signed(acc(4, true, true)),
        Ld | Std => ds(acc(8, false, false)),
        Ldu | Stdu => ds(acc(8, true, false)),
        Ldx | Stdx => acc(8, false, true),
        Ldux | Stdux => acc(8, true, true),
        Lhbrx | Sthbrx => reversed(acc(2, false, true)),
        Lwbrx | Stwbrx => reversed(acc(4, false, true)),
        _ => return None,
    })
}

fn float_access_of(class: InsnClass) -> Option<Access> {
    Some(match class {
        Lfs | Stfs => acc(4, false, false),
        Lfsu | Stfsu => acc(4, true, false),
        Lfsx | Stfsx => acc(4, false, true),
        Lfsux | Stfsux => acc(4, true, true),
        Lfd | Stfd => acc(8, false, false),
        Lfdu | Stfdu => acc(8, true, false),
        Lfdx | Stfdx => acc(8, false, true),
        Lfdux | Stfdux => acc(8, true, true),
        _ => return None,
    })
}

impl PpuDisasContext<'_> {
    fn gen_address(&self, ir: &mut Context, i: Insn, a: Access) -> TempIdx {
        let disp = if a.ds { i.ds() } else { i.simm() };
        match (a.update, a.indexed) {
            (true, true) => self.gen_ea_update(ir, i.ra(), Ok(i.rb())),
            (true, false) => self.gen_ea_update(ir, i.ra(), Err(disp)),
            (false, true) => self.gen_ea_indexed(ir, i.ra(), i.rb()),
            (false, false) => self.gen_ea_disp(ir, i.ra(), disp),
        }
    }

    fn gen_update(&self, ir: &mut Context, i: Insn, a: Access, ea: TempIdx) {
        if a.update {
            self.gen_set_gpr(ir, i.ra(), ea);
        }
    }
}

pub(super) fn load(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let Some(a) = access_of(i.class) else {
        return false;
    };
    let ea = ctx.gen_address(ir, i, a);
    let mut v = ctx.gen_load(ir, ea, a.bytes, a.reversed);
    if a.signed {
        let t = ir.new_temp(I64);
        v = ir.gen_sextract(I64, t, v, 0, a.bytes * 8);
    }
    ctx.gen_set_gpr(ir, i.rt(), v);
    ctx.gen_update(ir, i, a, ea);
    true
}

pub(super) fn store(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let Some(a) = access_of(i.class) else {
        return false;
    };
    let ea = ctx.gen_address(ir, i, a);
    ctx.gen_store(ir, ctx.gpr(i.rs()), ea, a.bytes, a.reversed);
    ctx.gen_update(ir, i, a, ea);
    true
}

pub(super) fn load_float(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let Some(a) = float_access_of(i.class) else {
        return false;
    };
    let ea = ctx.gen_address(ir, i, a);
    let v = ctx.gen_load(ir, ea, a.bytes, false);
    let d = ctx.regs.fpr[i.rt()];
    if a.bytes == 4 {
        let v32 = ir.new_temp(I32);
        ir.gen_extrl_i64_i32(v32, v);
        ir.gen_cvt_f32_f64(d, v32);
    } else {
        ir.gen_mov(I64, d, v);
    }
    ctx.gen_update(ir, i, a, ea);
    true
}

pub(super) fn store_float(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let Some(a) = float_access_of(i.class) else {
        return false;
    };
    let ea = ctx.gen_address(ir, i, a);
    let s = ctx.regs.fpr[i.rs()];
    let v = if a.bytes == 4 {
        let s32 = ir.new_temp(I32);
        ir.gen_cvt_f64_f32(s32, s);
        let t = ir.new_temp(I64);
        ir.gen_ext_u32_i64(t, s32)
    } else {
        s
    };
    ctx.gen_store(ir, v, ea, a.bytes, false);
    ctx.gen_update(ir, i, a, ea);
    true
}

pub(super) fn lvx(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let ea = ctx.gen_ea_indexed(ir, i.ra(), i.rb());
    let v = ctx.gen_load_vec(ir, ea);
    ir.gen_mov(Type::V128, ctx.regs.vr[i.vd()], v);
    true
}

pub(super) fn stvx(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let ea = ctx.gen_ea_indexed(ir, i.ra(), i.rb());
    ctx.gen_store_vec(ir, ctx.regs.vr[i.vd()], ea);
    true
}
