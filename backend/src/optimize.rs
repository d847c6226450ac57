// IR optimizer: single-pass constant folding, copy propagation and
// algebraic simplification. Runs right before code generation.

use ppujit_core::op::OpIdx;
use ppujit_core::opcode::{OpFlags, Opcode};
use ppujit_core::temp::TempIdx;
use ppujit_core::types::{Cond, Type};
use ppujit_core::{Context, OpDef, MAX_OP_ARGS};

use crate::threaded::ops::{eval_binary, eval_cond, eval_unary};

/// Per-temp optimization info tracked during the pass.
#[derive(Clone, Copy, Default)]
struct TempInfo {
    is_const: bool,
    val: u128,
    /// Canonical copy source (None = no known copy).
    copy_of: Option<TempIdx>,
}

type Args = [TempIdx; MAX_OP_ARGS];

/// Main optimizer entry point.
pub fn optimize(ctx: &mut Context) {
    let n_temps = ctx.nb_temps() as usize;
    let mut info: Vec<TempInfo> = vec![TempInfo::default(); n_temps];
    seed_consts(ctx, &mut info);

    let num_ops = ctx.num_ops();
    for oi in 0..num_ops {
        let op_idx = OpIdx(oi as u32);

        // Read op fields into locals to avoid borrow conflicts.
        let opc = ctx.op(op_idx).opc;
        let op_type = ctx.op(op_idx).op_type;
        let args = ctx.op(op_idx).args;
        let def = opc.def();

        // --- Join points and calls: forget everything ---
        // A label may be reached with other values; a call may
        // rewrite any global behind our back.
        if matches!(opc, Opcode::SetLabel | Opcode::Br | Opcode::ExitTb)
            || def.flags.contains(OpFlags::CALL)
        {
            invalidate_outputs(&mut info, def, &args, ctx);
            reset_all(ctx, &mut info);
            continue;
        }

        // Skip ops we don't optimize, but still invalidate
        // their outputs so stale info doesn't leak.
        if def.flags.contains(OpFlags::SIDE_EFFECTS)
            || def.flags.contains(OpFlags::VECTOR)
            || op_type == Type::V128
            || opc == Opcode::Nop
            || opc == Opcode::InsnStart
        {
            invalidate_outputs(&mut info, def, &args, ctx);
            continue;
        }

        // --- Copy propagation on inputs ---
        let iarg_start = def.nb_oargs as usize;
        let iarg_end = iarg_start + def.nb_iargs as usize;
        for (slot, &tidx) in args[iarg_start..iarg_end].iter().enumerate() {
            if let Some(src) = resolve_copy(&info, tidx) {
                ctx.op_mut(op_idx).args[iarg_start + slot] = src;
            }
        }

        // Re-read args after copy propagation.
        let args = ctx.op(op_idx).args;

        // --- Per-opcode optimization ---
        match opc {
            Opcode::Mov => fold_mov(&mut info, args, op_type),
            Opcode::Neg
            | Opcode::Not
            | Opcode::Clz
            | Opcode::Bswap16
            | Opcode::Bswap32
            | Opcode::Bswap64
            | Opcode::ExtI32I64
            | Opcode::ExtUI32I64
            | Opcode::ExtrlI64I32 => {
                fold_unary(ctx, &mut info, op_idx, opc, args, op_type);
            }
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::AndC
            | Opcode::OrC
            | Opcode::Eqv
            | Opcode::Nand
            | Opcode::Nor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Sar
            | Opcode::RotL
            | Opcode::RotR
            | Opcode::DivS
            | Opcode::DivU
            | Opcode::MulSH
            | Opcode::MulUH => {
                fold_binary(ctx, &mut info, op_idx, opc, args, op_type);
            }
            Opcode::SetCond => {
                fold_setcond(ctx, &mut info, op_idx, args, op_type);
            }
            Opcode::BrCond => {
                fold_brcond(ctx, &info, op_idx, args, op_type);
            }
            _ => invalidate_outputs(&mut info, def, &args, ctx),
        }
    }
}

// ---- Helper functions ----

fn seed_consts(ctx: &Context, info: &mut [TempInfo]) {
    for (i, ti) in info.iter_mut().enumerate() {
        let t = ctx.temp(TempIdx(i as u32));
        *ti = TempInfo {
            is_const: t.is_const(),
            val: t.val,
            copy_of: None,
        };
    }
}

/// Follow copy chain to canonical source.
fn resolve_copy(info: &[TempInfo], tidx: TempIdx) -> Option<TempIdx> {
    info.get(tidx.0 as usize).and_then(|ti| ti.copy_of)
}

/// Drop every fact except the values of constant temps.
fn reset_all(ctx: &Context, info: &mut Vec<TempInfo>) {
    info.resize(ctx.nb_temps() as usize, TempInfo::default());
    seed_consts(ctx, info);
}

/// Invalidate output temp info for ops we don't optimize.
fn invalidate_outputs(
    info: &mut Vec<TempInfo>,
    def: &OpDef,
    args: &Args,
    ctx: &Context,
) {
    for &tidx in args.iter().take(def.nb_oargs as usize) {
        if !ctx.temp(tidx).is_const() {
            invalidate_one(info, tidx);
        }
    }
}

/// Get temp info, returning default for out-of-range indices.
fn ti(info: &[TempInfo], tidx: TempIdx) -> TempInfo {
    info.get(tidx.0 as usize).copied().unwrap_or_default()
}

/// Record that `dst` is now a known constant.
fn set_const(info: &mut Vec<TempInfo>, dst: TempIdx, val: u128) {
    invalidate_one(info, dst);
    let i = dst.0 as usize;
    info[i].is_const = true;
    info[i].val = val;
}

/// Record that `dst` is a copy of `src`.
fn set_copy(info: &mut Vec<TempInfo>, dst: TempIdx, src: TempIdx) {
    let si = ti(info, src);
    invalidate_one(info, dst);
    if si.is_const {
        set_const(info, dst, si.val);
    } else if src != dst {
        info[dst.0 as usize].copy_of = Some(resolve_copy(info, src).unwrap_or(src));
    }
}

fn ensure_info(info: &mut Vec<TempInfo>, idx: usize) {
    if idx >= info.len() {
        info.resize(idx + 1, TempInfo::default());
    }
}

/// Replace op with `mov dst, const_val`.
fn replace_with_const(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    dst: TempIdx,
    val: u128,
    ty: Type,
) {
    let masked = val & ty.mask();
    let c = ctx.new_const_wide(ty, masked);
    ensure_info(info, c.0 as usize);
    info[c.0 as usize].is_const = true;
    info[c.0 as usize].val = masked;

    let op = ctx.op_mut(op_idx);
    op.opc = Opcode::Mov;
    op.op_type = ty;
    op.args[0] = dst;
    op.args[1] = c;
    op.nargs = 2;

    set_const(info, dst, masked);
}

/// Replace op with `mov dst, src`.
fn replace_with_mov(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    dst: TempIdx,
    src: TempIdx,
) {
    let op = ctx.op_mut(op_idx);
    op.opc = Opcode::Mov;
    op.args[0] = dst;
    op.args[1] = src;
    op.nargs = 2;

    // Conservative: just invalidate dst. The source may be
    // redefined later in the same block.
    invalidate_one(info, dst);
}

// ---- Per-opcode fold functions ----

/// Mov: record copy/const relationship.
fn fold_mov(info: &mut Vec<TempInfo>, args: Args, ty: Type) {
    let (dst, src) = (args[0], args[1]);
    let si = ti(info, src);
    if si.is_const {
        set_const(info, dst, si.val & ty.mask());
    } else {
        set_copy(info, dst, src);
    }
}

fn fold_unary(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    opc: Opcode,
    args: Args,
    ty: Type,
) {
    let (dst, src) = (args[0], args[1]);
    let si = ti(info, src);
    match eval_unary(opc, ty, si.val) {
        Some(val) if si.is_const => {
            let out = opc.fixed_type().unwrap_or(ty);
            replace_with_const(ctx, info, op_idx, dst, val, out);
        }
        _ => invalidate_one(info, dst),
    }
}

fn fold_binary(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    opc: Opcode,
    args: Args,
    ty: Type,
) {
    let (dst, a_idx, b_idx) = (args[0], args[1], args[2]);
    let ai = ti(info, a_idx);
    let bi = ti(info, b_idx);

    // Both constant → fold.
    if ai.is_const && bi.is_const {
        if let Some(val) = eval_binary(opc, ty, ai.val, bi.val) {
            replace_with_const(ctx, info, op_idx, dst, val, ty);
            return;
        }
    }

    // Algebraic simplification with one constant.
    if try_simplify(ctx, info, op_idx, opc, [dst, a_idx, b_idx], &ai, &bi, ty) {
        return;
    }

    // Same-operand identities: x & x → x, x | x → x,
    // x ^ x → 0, x - x → 0.
    if a_idx == b_idx {
        match opc {
            Opcode::And | Opcode::Or => {
                replace_with_mov(ctx, info, op_idx, dst, a_idx);
                return;
            }
            Opcode::Xor | Opcode::Sub | Opcode::AndC => {
                replace_with_const(ctx, info, op_idx, dst, 0, ty);
                return;
            }
            _ => {}
        }
    }

    invalidate_one(info, dst);
}

/// Algebraic simplification when one operand is constant.
/// Returns true if the op was simplified.
#[allow(clippy::too_many_arguments)]
fn try_simplify(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    opc: Opcode,
    [dst, a_idx, b_idx]: [TempIdx; 3],
    ai: &TempInfo,
    bi: &TempInfo,
    ty: Type,
) -> bool {
    let all_ones = ty.mask();

    // b is constant
    if bi.is_const {
        let b = bi.val & all_ones;
        match opc {
            // x + 0, x - 0, x | 0, x ^ 0, x << 0,
            // x >> 0, x >>> 0 → mov x
            Opcode::Add
            | Opcode::Sub
            | Opcode::Or
            | Opcode::Xor
            | Opcode::Shl
            | Opcode::Shr
            | Opcode::Sar
            | Opcode::RotL
            | Opcode::RotR
                if b == 0 =>
            {
                replace_with_mov(ctx, info, op_idx, dst, a_idx);
                return true;
            }
            // x * 0, x & 0 → mov 0
            Opcode::Mul | Opcode::And if b == 0 => {
                replace_with_const(ctx, info, op_idx, dst, 0, ty);
                return true;
            }
            // x * 1 → mov x
            Opcode::Mul if b == 1 => {
                replace_with_mov(ctx, info, op_idx, dst, a_idx);
                return true;
            }
            // x & -1 → mov x
            Opcode::And if b == all_ones => {
                replace_with_mov(ctx, info, op_idx, dst, a_idx);
                return true;
            }
            // x | -1 → mov -1
            Opcode::Or if b == all_ones => {
                replace_with_const(ctx, info, op_idx, dst, all_ones, ty);
                return true;
            }
            // andc x, -1 → mov 0
            Opcode::AndC if b == all_ones => {
                replace_with_const(ctx, info, op_idx, dst, 0, ty);
                return true;
            }
            _ => {}
        }
    }

    // a is constant
    if ai.is_const {
        let a = ai.val & all_ones;
        match opc {
            // 0 + x, 0 | x, 0 ^ x → mov x
            Opcode::Add | Opcode::Or | Opcode::Xor if a == 0 => {
                replace_with_mov(ctx, info, op_idx, dst, b_idx);
                return true;
            }
            // 0 - x → neg x (strength reduction)
            Opcode::Sub if a == 0 => {
                let op = ctx.op_mut(op_idx);
                op.opc = Opcode::Neg;
                op.args[0] = dst;
                op.args[1] = b_idx;
                op.nargs = 2;
                invalidate_one(info, dst);
                return true;
            }
            // 0 * x, 0 & x → mov 0
            Opcode::Mul | Opcode::And if a == 0 => {
                replace_with_const(ctx, info, op_idx, dst, 0, ty);
                return true;
            }
            // -1 | x → mov -1
            Opcode::Or if a == all_ones => {
                replace_with_const(ctx, info, op_idx, dst, all_ones, ty);
                return true;
            }
            _ => {}
        }
    }

    false
}

fn fold_setcond(
    ctx: &mut Context,
    info: &mut Vec<TempInfo>,
    op_idx: OpIdx,
    args: Args,
    ty: Type,
) {
    let (dst, a, b) = (args[0], args[1], args[2]);
    let (ai, bi) = (ti(info, a), ti(info, b));
    match Cond::from_raw(args[3].0) {
        Some(cond) if ai.is_const && bi.is_const => {
            let v = eval_cond(cond, ty, ai.val, bi.val) as u128;
            replace_with_const(ctx, info, op_idx, dst, v, ty);
        }
        _ => invalidate_one(info, dst),
    }
}

/// Fold BrCond when both inputs are constant.
fn fold_brcond(
    ctx: &mut Context,
    info: &[TempInfo],
    op_idx: OpIdx,
    args: Args,
    ty: Type,
) {
    let a_idx = args[0]; // iarg 0
    let b_idx = args[1]; // iarg 1
    let cond_carg = args[2]; // carg 0: condition
    let label_carg = args[3]; // carg 1: label id

    let ai = ti(info, a_idx);
    let bi = ti(info, b_idx);
    if !ai.is_const || !bi.is_const {
        return;
    }
    let Some(cond) = Cond::from_raw(cond_carg.0) else {
        return;
    };

    if eval_cond(cond, ty, ai.val, bi.val) {
        // Always taken → unconditional branch.
        let op = ctx.op_mut(op_idx);
        op.opc = Opcode::Br;
        op.args[0] = label_carg;
        op.nargs = 1;
    } else {
        // Never taken → nop. The label keeps its reference count,
        // which only matters for dangling-label detection.
        let op = ctx.op_mut(op_idx);
        op.opc = Opcode::Nop;
        op.nargs = 0;
    }
}

fn invalidate_one(info: &mut Vec<TempInfo>, dst: TempIdx) {
    let i = dst.0 as usize;
    ensure_info(info, i);
    info[i].is_const = false;
    info[i].copy_of = None;
    // Clear any temp that was a copy of dst, since dst
    // is being redefined.
    for ti in info.iter_mut() {
        if ti.copy_of == Some(dst) {
            ti.copy_of = None;
        }
    }
}
