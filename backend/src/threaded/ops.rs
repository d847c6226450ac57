//! Value semantics of the IR opcodes.
//!
//! Shared by the threaded code generator and the constant folder so
//! that folding can never disagree with execution. Scalar values are
//! carried zero-extended in a `u128`; callers mask to the op type.

use ppujit_core::{Cond, Opcode, Type, Vece};

fn mask_bits(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Sign-extend the low `bits` of `v` to 64 bits.
fn sext64(v: u64, bits: u32) -> i64 {
    if bits >= 64 {
        v as i64
    } else {
        ((v << (64 - bits)) as i64) >> (64 - bits)
    }
}

/// Evaluate `cond` on two values of type `ty`.
pub fn eval_cond(cond: Cond, ty: Type, a: u128, b: u128) -> bool {
    let bits = ty.size_bits().min(64);
    let (ua, ub) = (a as u64 & mask_bits(bits) as u64, b as u64 & mask_bits(bits) as u64);
    let (sa, sb) = (sext64(ua, bits), sext64(ub, bits));
    match cond {
        Cond::Never => false,
        Cond::Always => true,
        Cond::Eq => a & ty.mask() == b & ty.mask(),
        Cond::Ne => a & ty.mask() != b & ty.mask(),
        Cond::Lt => sa < sb,
        Cond::Ge => sa >= sb,
        Cond::Le => sa <= sb,
        Cond::Gt => sa > sb,
        Cond::Ltu => ua < ub,
        Cond::Geu => ua >= ub,
        Cond::Leu => ua <= ub,
        Cond::Gtu => ua > ub,
        Cond::TstEq => a & b & ty.mask() == 0,
        Cond::TstNe => a & b & ty.mask() != 0,
    }
}

/// Two-operand scalar ops. Bitwise ops also accept `V128`.
/// Returns `None` for opcodes that are not binary.
pub fn eval_binary(opc: Opcode, ty: Type, a: u128, b: u128) -> Option<u128> {
    let mask = ty.mask();
    let bits = ty.size_bits();
    let r = match opc {
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::AndC => a & !b,
        Opcode::OrC => a | !b,
        Opcode::Eqv => !(a ^ b),
        Opcode::Nand => !(a & b),
        Opcode::Nor => !(a | b),
        _ if ty == Type::V128 => return None,
        _ => {
            let (x, y) = ((a & mask) as u64, (b & mask) as u64);
            let sh = (y as u32) % bits;
            let r: u64 = match opc {
                Opcode::Add => x.wrapping_add(y),
                Opcode::Sub => x.wrapping_sub(y),
                Opcode::Mul => x.wrapping_mul(y),
                Opcode::DivS => {
                    let (sx, sy) = (sext64(x, bits), sext64(y, bits));
                    let min = sext64(1 << (bits - 1), bits);
                    if sy == 0 || (sx == min && sy == -1) {
                        0
                    } else {
                        (sx / sy) as u64
                    }
                }
                Opcode::DivU => x.checked_div(y).unwrap_or(0),
                Opcode::MulSH => {
                    let p = sext64(x, bits) as i128 * sext64(y, bits) as i128;
                    (p >> bits) as u64
                }
                Opcode::MulUH => ((x as u128 * y as u128) >> bits) as u64,
                Opcode::Shl => x << sh,
                Opcode::Shr => x >> sh,
                Opcode::Sar => (sext64(x, bits) >> sh) as u64,
                Opcode::RotL if ty == Type::I32 => (x as u32).rotate_left(sh) as u64,
                Opcode::RotL => x.rotate_left(sh),
                Opcode::RotR if ty == Type::I32 => (x as u32).rotate_right(sh) as u64,
                Opcode::RotR => x.rotate_right(sh),
                _ => return None,
            };
            r as u128
        }
    };
    Some(r & mask)
}

/// One-operand ops, including the width conversions.
pub fn eval_unary(opc: Opcode, ty: Type, a: u128) -> Option<u128> {
    let x = a as u64;
    let r = match opc {
        Opcode::Mov => a,
        Opcode::Not => !a,
        Opcode::Neg => x.wrapping_neg() as u128,
        Opcode::Clz => match ty {
            Type::I32 => (x as u32).leading_zeros() as u128,
            _ => x.leading_zeros() as u128,
        },
        Opcode::Bswap16 => (x as u16).swap_bytes() as u128,
        Opcode::Bswap32 => (x as u32).swap_bytes() as u128,
        Opcode::Bswap64 => x.swap_bytes() as u128,
        Opcode::Bswap128 => a.swap_bytes(),
        Opcode::ExtI32I64 => x as u32 as i32 as i64 as u64 as u128,
        Opcode::ExtUI32I64 | Opcode::ExtrlI64I32 => x as u32 as u128,
        Opcode::CvtF32F64 => (f32::from_bits(x as u32) as f64).to_bits() as u128,
        Opcode::CvtF64F32 => (f64::from_bits(x) as f32).to_bits() as u128,
        _ => return None,
    };
    let out = opc.fixed_type().unwrap_or(ty);
    Some(r & out.mask())
}

pub fn eval_extract(ty: Type, a: u128, ofs: u32, len: u32, signed: bool) -> u128 {
    let field = (a >> ofs) & mask_bits(len);
    let v = if signed {
        sext64(field as u64, len) as u64 as u128
    } else {
        field
    };
    v & ty.mask()
}

pub fn eval_deposit(ty: Type, a: u128, b: u128, ofs: u32, len: u32) -> u128 {
    let m = mask_bits(len) << ofs;
    ((a & !m) | ((b << ofs) & m)) & ty.mask()
}

// -- Vector lanes --

/// Lane `i` (lane 0 is the most significant) of width `w`.
pub fn lane(v: u128, w: u32, i: u32) -> u64 {
    ((v >> (128 - (i + 1) * w)) & mask_bits(w)) as u64
}

fn put_lane(v: u128, w: u32, i: u32, x: u64) -> u128 {
    let shift = 128 - (i + 1) * w;
    let m = mask_bits(w) << shift;
    (v & !m) | (((x as u128) << shift) & m)
}

pub fn dup(vece: Vece, x: u64) -> u128 {
    let w = vece.lane_bits();
    (0..vece.lanes()).fold(0, |acc, i| put_lane(acc, w, i, x))
}

pub fn eval_vec_binary(opc: Opcode, vece: Vece, a: u128, b: u128) -> Option<u128> {
    let w = vece.lane_bits();
    let umax = mask_bits(w) as i128;
    let (smin, smax) = (-(1i128 << (w - 1)), (1i128 << (w - 1)) - 1);
    let f = |x: u64, y: u64| -> Option<u64> {
        let (sx, sy) = (sext64(x, w) as i128, sext64(y, w) as i128);
        let n = (y & (w as u64 - 1)) as u32;
        Some(match opc {
            Opcode::AddVec => x.wrapping_add(y),
            Opcode::SubVec => x.wrapping_sub(y),
            Opcode::UsaddVec => (x as i128 + y as i128).clamp(0, umax) as u64,
            Opcode::UssubVec => (x as i128 - y as i128).clamp(0, umax) as u64,
            Opcode::SsaddVec => (sx + sy).clamp(smin, smax) as u64,
            Opcode::SssubVec => (sx - sy).clamp(smin, smax) as u64,
            Opcode::UminVec => x.min(y),
            Opcode::UmaxVec => x.max(y),
            Opcode::SminVec => sx.min(sy) as u64,
            Opcode::SmaxVec => sx.max(sy) as u64,
            Opcode::ShlvVec => x << n,
            Opcode::ShrvVec => x >> n,
            Opcode::SarvVec => (sext64(x, w) >> n) as u64,
            Opcode::RotlvVec if n == 0 => x,
            Opcode::RotlvVec => (x << n) | (x >> (w - n)),
            _ => return None,
        })
    };
    let mut r = 0;
    for i in 0..vece.lanes() {
        r = put_lane(r, w, i, f(lane(a, w, i), lane(b, w, i))?);
    }
    Some(r)
}

/// Per-lane compare yielding all-ones or zero lanes.
pub fn eval_cmp_vec(vece: Vece, cond: Cond, a: u128, b: u128) -> u128 {
    let w = vece.lane_bits();
    let mut r = 0;
    for i in 0..vece.lanes() {
        let (x, y) = (lane(a, w, i), lane(b, w, i));
        let (x, y) = if cond.is_signed() {
            (sext64(x, w) as u64, sext64(y, w) as u64)
        } else {
            (x, y)
        };
        if eval_cond(cond, Type::I64, x as u128, y as u128) {
            r = put_lane(r, w, i, u64::MAX);
        }
    }
    r
}

pub fn eval_bitsel(sel: u128, t: u128, f: u128) -> u128 {
    (t & sel) | (f & !sel)
}
