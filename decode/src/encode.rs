//! Instruction word encoders.
//!
//! Field arguments are masked to their width; branch displacements
//! must be word aligned and within range (see [`b_in_range`] and
//! [`bc_in_range`]).

use crate::fields::bo;

const fn po(p: u32) -> u32 {
    p << 26
}

const fn r(v: u32, shift: u32) -> u32 {
    (v & 0x1F) << shift
}

// -- Generic forms --

pub const fn d_form(primary: u32, rt: u32, ra: u32, imm: u16) -> u32 {
    po(primary) | r(rt, 21) | r(ra, 16) | imm as u32
}

pub const fn ds_form(primary: u32, rt: u32, ra: u32, ds: i16, xo: u32) -> u32 {
    po(primary) | r(rt, 21) | r(ra, 16) | (ds as u16 as u32 & 0xFFFC) | (xo & 3)
}

pub const fn x_form(primary: u32, rt: u32, ra: u32, rb: u32, xo: u32, rc: bool) -> u32 {
    po(primary) | r(rt, 21) | r(ra, 16) | r(rb, 11) | ((xo & 0x3FF) << 1) | rc as u32
}

pub const fn xo_form(rt: u32, ra: u32, rb: u32, oe: bool, xo: u32, rc: bool) -> u32 {
    po(31)
        | r(rt, 21)
        | r(ra, 16)
        | r(rb, 11)
        | ((oe as u32) << 10)
        | ((xo & 0x1FF) << 1)
        | rc as u32
}

pub const fn xl_form(bt: u32, ba: u32, bb: u32, xo: u32, lk: bool) -> u32 {
    po(19) | r(bt, 21) | r(ba, 16) | r(bb, 11) | ((xo & 0x3FF) << 1) | lk as u32
}

pub const fn m_form(primary: u32, rs: u32, ra: u32, sh: u32, mb: u32, me: u32, rc: bool) -> u32 {
    po(primary) | r(rs, 21) | r(ra, 16) | r(sh, 11) | r(mb, 6) | r(me, 1) | rc as u32
}

/// MD form with the split 6-bit `sh` and `mb` fields.
pub const fn md_form(rs: u32, ra: u32, sh: u32, mb: u32, xo: u32, rc: bool) -> u32 {
    po(30)
        | r(rs, 21)
        | r(ra, 16)
        | r(sh, 11)
        | ((mb & 0x1F) << 6)
        | (mb & 0x20)
        | ((xo & 7) << 2)
        | ((sh & 0x20) >> 4)
        | rc as u32
}

pub const fn a_form(primary: u32, frt: u32, fra: u32, frb: u32, frc: u32, xo: u32, rc: bool) -> u32 {
    po(primary) | r(frt, 21) | r(fra, 16) | r(frb, 11) | r(frc, 6) | ((xo & 0x1F) << 1) | rc as u32
}

pub const fn vx_form(vd: u32, va: u32, vb: u32, xo: u32) -> u32 {
    po(4) | r(vd, 21) | r(va, 16) | r(vb, 11) | (xo & 0x7FF)
}

pub const fn va_form(vd: u32, va: u32, vb: u32, vc: u32, xo: u32) -> u32 {
    po(4) | r(vd, 21) | r(va, 16) | r(vb, 11) | r(vc, 6) | (xo & 0x3F)
}

pub const fn vc_form(vd: u32, va: u32, vb: u32, rc: bool, xo: u32) -> u32 {
    po(4) | r(vd, 21) | r(va, 16) | r(vb, 11) | ((rc as u32) << 10) | (xo & 0x3FF)
}

pub const fn xfx_spr(rt: u32, spr: u32, xo: u32) -> u32 {
    let swapped = ((spr & 0x1F) << 5) | ((spr >> 5) & 0x1F);
    po(31) | r(rt, 21) | (swapped << 11) | (xo << 1)
}

// -- Branches --

/// Whether `disp` fits the 26-bit I-form displacement.
pub const fn b_in_range(disp: i32) -> bool {
    disp & 3 == 0 && disp >= -(1 << 25) && disp < (1 << 25)
}

/// Whether `disp` fits the 16-bit B-form displacement.
pub const fn bc_in_range(disp: i32) -> bool {
    disp & 3 == 0 && disp >= -(1 << 15) && disp < (1 << 15)
}

pub const fn b(disp: i32, aa: bool, lk: bool) -> u32 {
    po(18) | (disp as u32 & 0x03FF_FFFC) | ((aa as u32) << 1) | lk as u32
}

pub const fn bc(bo: u32, bi: u32, disp: i32, aa: bool, lk: bool) -> u32 {
    po(16) | r(bo, 21) | r(bi, 16) | (disp as u32 & 0xFFFC) | ((aa as u32) << 1) | lk as u32
}

pub const fn bclr(bo: u32, bi: u32, lk: bool) -> u32 {
    xl_form(bo, bi, 0, 16, lk)
}

pub const fn bcctr(bo: u32, bi: u32, lk: bool) -> u32 {
    xl_form(bo, bi, 0, 528, lk)
}

/// Unconditional return.
pub const fn blr() -> u32 {
    bclr(bo::ALWAYS, 0, false)
}

pub const fn bctr() -> u32 {
    bcctr(bo::ALWAYS, 0, false)
}

pub const fn bctrl() -> u32 {
    bcctr(bo::ALWAYS, 0, true)
}

/// Branch if CR bit `bi` is set.
pub const fn bt(bi: u32, disp: i32) -> u32 {
    bc(bo::NO_CTR | bo::COND_TRUE, bi, disp, false, false)
}

/// Branch if CR bit `bi` is clear.
pub const fn bf(bi: u32, disp: i32) -> u32 {
    bc(bo::NO_CTR, bi, disp, false, false)
}

/// Decrement CTR, branch if it is now non-zero.
pub const fn bdnz(disp: i32) -> u32 {
    bc(bo::NO_COND, 0, disp, false, false)
}

pub const fn sc() -> u32 {
    po(17) | 2
}

// -- Common integer instructions --

pub const fn addi(rt: u32, ra: u32, simm: i16) -> u32 {
    d_form(14, rt, ra, simm as u16)
}

pub const fn addis(rt: u32, ra: u32, simm: i16) -> u32 {
    d_form(15, rt, ra, simm as u16)
}

pub const fn li(rt: u32, simm: i16) -> u32 {
    addi(rt, 0, simm)
}

pub const fn lis(rt: u32, simm: i16) -> u32 {
    addis(rt, 0, simm)
}

pub const fn ori(ra: u32, rs: u32, uimm: u16) -> u32 {
    d_form(24, rs, ra, uimm)
}

pub const fn nop() -> u32 {
    ori(0, 0, 0)
}

pub const fn add(rt: u32, ra: u32, rb: u32) -> u32 {
    xo_form(rt, ra, rb, false, 266, false)
}

pub const fn subf(rt: u32, ra: u32, rb: u32) -> u32 {
    xo_form(rt, ra, rb, false, 40, false)
}

pub const fn mullw(rt: u32, ra: u32, rb: u32) -> u32 {
    xo_form(rt, ra, rb, false, 235, false)
}

pub const fn or(ra: u32, rs: u32, rb: u32) -> u32 {
    x_form(31, rs, ra, rb, 444, false)
}

pub const fn mr(ra: u32, rs: u32) -> u32 {
    or(ra, rs, rs)
}

/// cmpw / cmpd
pub const fn cmp(crf: u32, l: bool, ra: u32, rb: u32) -> u32 {
    x_form(31, ((crf & 7) << 2) | l as u32, ra, rb, 0, false)
}

/// cmpwi / cmpdi
pub const fn cmpi(crf: u32, l: bool, ra: u32, simm: i16) -> u32 {
    d_form(11, ((crf & 7) << 2) | l as u32, ra, simm as u16)
}

pub const fn cmpli(crf: u32, l: bool, ra: u32, uimm: u16) -> u32 {
    d_form(10, ((crf & 7) << 2) | l as u32, ra, uimm)
}

pub const fn rlwinm(ra: u32, rs: u32, sh: u32, mb: u32, me: u32) -> u32 {
    m_form(21, rs, ra, sh, mb, me, false)
}

pub const fn mfspr(rt: u32, spr: u32) -> u32 {
    xfx_spr(rt, spr, 339)
}

pub const fn mtspr(spr: u32, rs: u32) -> u32 {
    xfx_spr(rs, spr, 467)
}

pub const fn mflr(rt: u32) -> u32 {
    mfspr(rt, crate::fields::spr::LR)
}

pub const fn mtlr(rs: u32) -> u32 {
    mtspr(crate::fields::spr::LR, rs)
}

pub const fn mtctr(rs: u32) -> u32 {
    mtspr(crate::fields::spr::CTR, rs)
}

// -- Loads and stores --

pub const fn lwz(rt: u32, ra: u32, d: i16) -> u32 {
    d_form(32, rt, ra, d as u16)
}

pub const fn stw(rs: u32, ra: u32, d: i16) -> u32 {
    d_form(36, rs, ra, d as u16)
}

pub const fn lbz(rt: u32, ra: u32, d: i16) -> u32 {
    d_form(34, rt, ra, d as u16)
}

pub const fn stb(rs: u32, ra: u32, d: i16) -> u32 {
    d_form(38, rs, ra, d as u16)
}

pub const fn ld(rt: u32, ra: u32, ds: i16) -> u32 {
    ds_form(58, rt, ra, ds, 0)
}

pub const fn std(rs: u32, ra: u32, ds: i16) -> u32 {
    ds_form(62, rs, ra, ds, 0)
}

pub const fn stwu(rs: u32, ra: u32, d: i16) -> u32 {
    d_form(37, rs, ra, d as u16)
}

pub const fn lvx(vd: u32, ra: u32, rb: u32) -> u32 {
    x_form(31, vd, ra, rb, 103, false)
}

pub const fn stvx(vs: u32, ra: u32, rb: u32) -> u32 {
    x_form(31, vs, ra, rb, 231, false)
}
