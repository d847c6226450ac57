//! Floating-point register moves.
//!
//! Only the sign-manipulating moves are lowered; they are pure bit
//! operations on the IEEE pattern. Record forms and all arithmetic go
//! to the interpreter.

use ppujit_core::{Context, Type};
use ppujit_decode::class::InsnClass::*;
use ppujit_decode::Insn;

use super::trans_int::{emit, BinOp};
use super::PpuDisasContext;

const SIGN: u64 = 1 << 63;

pub(super) fn move_sign(ctx: &mut PpuDisasContext<'_>, ir: &mut Context, i: Insn) -> bool {
    if i.rc() {
        return false;
    }
    let b = ctx.regs.fpr[i.rb()];
    let d = ctx.regs.fpr[i.rt()];
    let op: Option<BinOp> = match i.class {
        Fneg => Some(Context::gen_xor),
        Fabs => Some(Context::gen_andc),
        Fnabs => Some(Context::gen_or),
        _ => None,
    };
    match op {
        Some(op) => {
            let sign = ctx.const64(ir, SIGN);
            let r = emit(ir, Type::I64, op, b, sign);
            ir.gen_mov(Type::I64, d, r);
        }
        None => {
            ir.gen_mov(Type::I64, d, b);
        }
    }
    true
}
