//! Branch lowering.
//!
//! Local targets (inside the unit, see [`BlockInfo::is_local`]) become
//! IR branches to pre-declared labels and feed the unit assembler's
//! nesting bookkeeping. Everything else leaves the unit: plain jumps
//! set `pc` and exit with `EXIT_BLOCK_ENDED`, returns exit with
//! `EXIT_RETURN`, and linking branches call the target unit in place
//! and continue when it returns to the instruction after the call.
//!
//! [`BlockInfo::is_local`]: super::analyse::BlockInfo::is_local

use ppujit_core::{Cond, Context, TempIdx, Type, EXIT_BLOCK_ENDED, EXIT_RETURN};
use ppujit_decode::class::InsnClass;
use ppujit_decode::fields::bo;
use ppujit_decode::Insn;

use super::trans_int::emit;
use super::PpuDisasContext;

const I32: Type = Type::I32;
const I64: Type = Type::I64;

/// Call sites with more observed targets than this use the generic
/// path only.
const MAX_INLINE_TARGETS: usize = 4;

impl PpuDisasContext<'_> {
    /// BO/BI condition as I32 0/1, or `None` when always taken.
    /// Decrements CTR when BO asks for it.
    fn gen_condition(&self, ir: &mut Context, i: Insn) -> Option<TempIdx> {
        let bo_f = i.bo();
        let ctr_ok = if bo_f & bo::NO_CTR == 0 {
            let ctr = self.regs.ctr;
            let one = self.const64(ir, 1);
            ir.gen_sub(I64, ctr, ctr, one);
            let zero = self.const64(ir, 0);
            let cond = if bo_f & bo::CTR_ZERO != 0 {
                Cond::Eq
            } else {
                Cond::Ne
            };
            let t = ir.new_temp(I64);
            ir.gen_setcond(I64, t, ctr, zero, cond);
            let t32 = ir.new_temp(I32);
            Some(ir.gen_extrl_i64_i32(t32, t))
        } else {
            None
        };

        let cond_ok = if bo_f & bo::NO_COND == 0 {
            let bit = self.gen_cr_bit(ir, i.bi());
            if bo_f & bo::COND_TRUE != 0 {
                Some(bit)
            } else {
                let one = ir.new_const(I32, 1);
                Some(emit(ir, I32, Context::gen_xor, bit, one))
            }
        } else {
            None
        };

        match (ctr_ok, cond_ok) {
            (Some(a), Some(b)) => Some(emit(ir, I32, Context::gen_and, a, b)),
            (a, b) => a.or(b),
        }
    }

    /// Branch to a fresh label when `c` is false; returns the label.
    fn gen_skip_unless(&self, ir: &mut Context, c: TempIdx) -> u32 {
        let skip = ir.new_label();
        let zero = ir.new_const(I32, 0);
        ir.gen_brcond(I32, c, zero, Cond::Eq, skip);
        skip
    }

    fn gen_set_lr_next(&self, ir: &mut Context) {
        let next = self.const64(ir, self.pc().wrapping_add(4) as u64);
        ir.gen_mov(I64, self.regs.lr, next);
    }

    /// `pc = target; exit code`.
    fn gen_leave(&self, ir: &mut Context, target: TempIdx, code: u32) {
        ir.gen_mov(I64, self.regs.pc, target);
        ir.gen_exit_tb(code);
    }

    /// Run the unit at `target` and continue here if it returns to
    /// the next instruction.
    fn gen_call_sequence(&self, ir: &mut Context, target: TempIdx) {
        ir.gen_mov(I64, self.regs.pc, target);
        let t32 = ir.new_temp(I32);
        ir.gen_extrl_i64_i32(t32, target);
        let r = ir.new_temp(I32);
        ir.gen_call_block(r, t32);
        self.gen_check_halt(ir, r, I32);

        let next = self.const64(ir, self.pc().wrapping_add(4) as u64);
        let cont = ir.new_label();
        ir.gen_brcond(I64, self.regs.pc, next, Cond::Eq, cont);
        ir.gen_exit_tb(EXIT_BLOCK_ENDED);
        ir.gen_set_label(cont);
    }

    /// Target masked to a word boundary, captured before any
    /// register update.
    fn gen_masked_target(&self, ir: &mut Context, reg: TempIdx) -> TempIdx {
        let m = self.const64(ir, !3u64);
        emit(ir, I64, Context::gen_and, reg, m)
    }
}

/// b, ba, bl, bla, bc, bca, bcl, bcla.
pub(super) fn branch(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let pc = ctx.pc();
    let target = i.branch_target(pc);
    let cond = match i.class {
        InsnClass::B => None,
        _ => ctx.gen_condition(ir, i),
    };

    if i.lk() {
        ctx.gen_set_lr_next(ir);
        let skip = cond.map(|c| ctx.gen_skip_unless(ir, c));
        let t = ctx.const64(ir, target as u64);
        ctx.gen_call_sequence(ir, t);
        if let Some(skip) = skip {
            ir.gen_set_label(skip);
        }
        return true;
    }

    let label = if ctx.is_local(target) {
        ctx.unit.label_for(target)
    } else {
        None
    };
    match (label, cond) {
        (Some(label), None) => {
            ir.gen_br(label);
            if target > pc {
                ctx.unit.open_else(target);
            }
            ctx.ends_flow = true;
        }
        (Some(label), Some(c)) => {
            let zero = ir.new_const(I32, 0);
            ir.gen_brcond(I32, c, zero, Cond::Ne, label);
            if target > pc {
                ctx.unit.open_if(target);
            }
        }
        (None, None) => {
            let t = ctx.const64(ir, target as u64);
            ctx.gen_leave(ir, t, EXIT_BLOCK_ENDED);
            ctx.ends_flow = true;
        }
        (None, Some(c)) => {
            let skip = ctx.gen_skip_unless(ir, c);
            let t = ctx.const64(ir, target as u64);
            ctx.gen_leave(ir, t, EXIT_BLOCK_ENDED);
            ir.gen_set_label(skip);
        }
    }
    true
}

/// bclr, bclrl.
pub(super) fn bclr(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    let target = ctx.gen_masked_target(ir, ctx.regs.lr);
    let cond = ctx.gen_condition(ir, i);
    if i.lk() {
        ctx.gen_set_lr_next(ir);
    }
    let skip = cond.map(|c| ctx.gen_skip_unless(ir, c));
    if i.lk() {
        ctx.gen_call_sequence(ir, target);
    } else {
        ctx.gen_leave(ir, target, EXIT_RETURN);
    }
    match skip {
        Some(skip) => ir.gen_set_label(skip),
        None if !i.lk() => ctx.ends_flow = true,
        None => {}
    }
    true
}

/// bcctr, bcctrl. Forms that decrement CTR are invalid.
pub(super) fn bcctr(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    if i.bo() & bo::NO_CTR == 0 {
        ctx.gen_unsupported(ir, i, "bcctr with CTR decrement");
        return true;
    }
    let target = ctx.gen_masked_target(ir, ctx.regs.ctr);
    let cond = ctx.gen_condition(ir, i);
    if i.lk() {
        ctx.gen_set_lr_next(ir);
    }
    let skip = cond.map(|c| ctx.gen_skip_unless(ir, c));
    if i.lk() {
        gen_indirect_call(ctx, ir, target);
    } else {
        ctx.gen_leave(ir, target, EXIT_BLOCK_ENDED);
    }
    match skip {
        Some(skip) => ir.gen_set_label(skip),
        None if !i.lk() => ctx.ends_flow = true,
        None => {}
    }
    true
}

/// Computed call: direct cases for targets already seen at this site,
/// then a generic path that records the new target.
fn gen_indirect_call(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, target: TempIdx) {
    let site = ctx.pc();
    let known = ctx
        .profile
        .map(|p| p.known_targets(site))
        .unwrap_or_default();
    let done = ir.new_label();

    for k in known.into_iter().take(MAX_INLINE_TARGETS) {
        let next_case = ir.new_label();
        let kc = ctx.const64(ir, k as u64);
        ir.gen_brcond(I64, target, kc, Cond::Ne, next_case);
        ctx.gen_call_sequence(ir, kc);
        ir.gen_br(done);
        ir.gen_set_label(next_case);
    }

    let s = ctx.const64(ir, site as u64);
    let r = ir.new_temp(I64);
    ir.gen_call(r, ctx.helpers.observe_call, &[s, target]);
    ctx.gen_call_sequence(ir, target);
    ir.gen_set_label(done);
}
