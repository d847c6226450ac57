//! Class → lowering table.
//!
//! A lowering returns `false` when it declines a particular encoding
//! (an OE form, an unknown SPR); the instruction then goes through the
//! interpreter like any class without a lowering.

use ppujit_core::Context;
use ppujit_decode::class::InsnClass::{self, *};
use ppujit_decode::Insn;

use super::{
    trans_branch, trans_cmp, trans_fp, trans_int, trans_mem, trans_rot, trans_vec,
    PpuDisasContext,
};

type LowerFn = fn(&mut PpuDisasContext<'_>, &mut Context, Insn) -> bool;

/// Ordering and cache hints have no effect on a single-threaded
/// guest view of memory.
fn barrier(_: &mut PpuDisasContext<'_>, _: &mut Context, _: Insn) -> bool {
    true
}

fn lowering(class: InsnClass) -> Option<LowerFn> {
    Some(match class {
        // -- Integer --
        Addi | Addis => trans_int::addi,
        Addic | AddicRc | Subfic => trans_int::add_imm_carry,
        Mulli => trans_int::mulli,
        Add | Addc | Adde | Addze | Addme | Subf | Subfc | Subfe | Subfze
        | Subfme | Neg => trans_int::add_family,
        Mullw | Mulld | Mulhw | Mulhwu | Mulhd | Mulhdu => trans_int::mul_family,
        Divw | Divwu | Divd | Divdu => trans_int::div_family,
        And | Andc | Or | Orc | Xor | Nor | Nand | Eqv => trans_int::logical,
        AndiRc | AndisRc | Ori | Oris | Xori | Xoris => trans_int::logical_imm,
        Extsb | Extsh | Extsw | Cntlzw | Cntlzd => trans_int::unary,
        Slw | Srw | Sraw | Srawi | Sld | Srd | Srad | Sradi => trans_int::shift,
        Rlwinm | Rlwimi | Rlwnm => trans_rot::rotate32,
        Rldicl | Rldicr | Rldic | Rldimi | Rldcl | Rldcr => trans_rot::rotate64,
        Cmp | Cmpl | Cmpi | Cmpli => trans_cmp::compare,
        Crand | Cror | Crxor | Crnand | Crnor | Creqv | Crandc | Crorc => {
            trans_cmp::cr_logical
        }
        Mcrf => trans_cmp::mcrf,
        Mfcr => trans_cmp::mfcr,
        Mtcrf => trans_cmp::mtcrf,
        Mfspr => trans_cmp::mfspr,
        Mtspr => trans_cmp::mtspr,

        // -- Branch --
        B | Bc => trans_branch::branch,
        Bclr => trans_branch::bclr,
        Bcctr => trans_branch::bcctr,

        // -- System --
        Sync | Isync | Eieio | Dcbt | Dcbtst | Dcbf | Dcbst | Icbi => barrier,

        // -- Memory --
        Lbz | Lbzu | Lbzx | Lbzux | Lhz | Lhzu | Lhzx | Lhzux | Lha | Lhau
        | Lhax | Lhaux | Lwz | Lwzu | Lwzx | Lwzux | Lwa | Lwax | Lwaux | Ld
        | Ldu | Ldx | Ldux | Lhbrx | Lwbrx => trans_mem::load,
        Stb | Stbu | Stbx | Stbux | Sth | Sthu | Sthx | Sthux | Stw | Stwu
        | Stwx | Stwux | Std | Stdu | Stdx | Stdux | Sthbrx | Stwbrx => {
            trans_mem::store
        }
        Lfs | Lfsu | Lfsx | Lfsux | Lfd | Lfdu | Lfdx | Lfdux => trans_mem::load_float,
        Stfs | Stfsu | Stfsx | Stfsux | Stfd | Stfdu | Stfdx | Stfdux => {
            trans_mem::store_float
        }
        Lvx => trans_mem::lvx,
        Stvx => trans_mem::stvx,

        // -- Float --
        Fmr | Fneg | Fabs | Fnabs => trans_fp::move_sign,

        // -- Vector --
        Vsel => trans_vec::vsel,
        Vand | Vandc | Vor | Vxor | Vnor => trans_vec::logical,
        Vcmpequb | Vcmpequh | Vcmpequw | Vcmpgtub | Vcmpgtuh | Vcmpgtuw
        | Vcmpgtsb | Vcmpgtsh | Vcmpgtsw => trans_vec::int_compare,
        Vspltb | Vsplth | Vspltw => trans_vec::splat,
        Vspltisb | Vspltish | Vspltisw => trans_vec::splat_imm,
        Vaddubm | Vadduhm | Vadduwm | Vsububm | Vsubuhm | Vsubuwm | Vaddubs
        | Vadduhs | Vadduws | Vaddsbs | Vaddshs | Vaddsws | Vsububs | Vsubuhs
        | Vsubuws | Vsubsbs | Vsubshs | Vsubsws | Vmaxub | Vmaxuh | Vmaxuw
        | Vmaxsb | Vmaxsh | Vmaxsw | Vminub | Vminuh | Vminuw | Vminsb | Vminsh
        | Vminsw | Vrlb | Vrlh | Vrlw | Vslb | Vslh | Vslw | Vsrb | Vsrh
        | Vsrw | Vsrab | Vsrah | Vsraw => trans_vec::int_arith,

        // sc, traps, dcbz, mftb, lmw/stmw, reservations, FP arithmetic
        // and FPSCR, vperm, vsldoi, vector float, VSCR moves.
        _ => return None,
    })
}

/// Whether `class` has a lowering of its own. Individual encodings
/// may still be declined at lowering time.
pub fn has_direct_lowering(class: InsnClass) -> bool {
    lowering(class).is_some()
}

pub(super) fn lower_insn(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, insn: Insn) {
    if insn.class == Unknown {
        ctx.gen_unknown(ir, insn);
        return;
    }
    match lowering(insn.class) {
        Some(f) if f(ctx, ir, insn) => {}
        _ => ctx.gen_fallback(ir, insn),
    }
}
