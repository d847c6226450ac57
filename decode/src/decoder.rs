use crate::class::InsnClass;
use crate::fields::Insn;

use InsnClass::*;

/// Classify one instruction word.
///
/// Every word maps to exactly one class; reserved or unrecognized
/// encodings map to [`InsnClass::Unknown`].
pub fn decode(word: u32) -> Insn {
    Insn::new(word, classify(word))
}

fn classify(w: u32) -> InsnClass {
    match w >> 26 {
        2 => Tdi,
        3 => Twi,
        4 => decode_vector(w),
        7 => Mulli,
        8 => Subfic,
        10 => Cmpli,
        11 => Cmpi,
        12 => Addic,
        13 => AddicRc,
        14 => Addi,
        15 => Addis,
        16 => Bc,
        17 if w & 2 != 0 => Sc,
        18 => B,
        19 => decode_19(w),
        20 => Rlwimi,
        21 => Rlwinm,
        23 => Rlwnm,
        24 => Ori,
        25 => Oris,
        26 => Xori,
        27 => Xoris,
        28 => AndiRc,
        29 => AndisRc,
        30 => decode_30(w),
        31 => decode_31(w),
        32 => Lwz,
        33 => Lwzu,
        34 => Lbz,
        35 => Lbzu,
        36 => Stw,
        37 => Stwu,
        38 => Stb,
        39 => Stbu,
        40 => Lhz,
        41 => Lhzu,
        42 => Lha,
        43 => Lhau,
        44 => Sth,
        45 => Sthu,
        46 => Lmw,
        47 => Stmw,
        48 => Lfs,
        49 => Lfsu,
        50 => Lfd,
        51 => Lfdu,
        52 => Stfs,
        53 => Stfsu,
        54 => Stfd,
        55 => Stfdu,
        58 => match w & 3 {
            0 => Ld,
            1 => Ldu,
            2 => Lwa,
            _ => Unknown,
        },
        59 => decode_59(w),
        62 => match w & 3 {
            0 => Std,
            1 => Stdu,
            _ => Unknown,
        },
        63 => decode_63(w),
        _ => Unknown,
    }
}

fn decode_19(w: u32) -> InsnClass {
    match (w >> 1) & 0x3FF {
        0 => Mcrf,
        16 => Bclr,
        33 => Crnor,
        129 => Crandc,
        150 => Isync,
        193 => Crxor,
        225 => Crnand,
        257 => Crand,
        289 => Creqv,
        417 => Crorc,
        449 => Cror,
        528 => Bcctr,
        _ => Unknown,
    }
}

fn decode_30(w: u32) -> InsnClass {
    match (w >> 2) & 7 {
        0 => Rldicl,
        1 => Rldicr,
        2 => Rldic,
        3 => Rldimi,
        _ => match (w >> 1) & 0xF {
            8 => Rldcl,
            9 => Rldcr,
            _ => Unknown,
        },
    }
}

fn decode_31(w: u32) -> InsnClass {
    if (w >> 2) & 0x1FF == 413 {
        return Sradi;
    }
    let x = match (w >> 1) & 0x3FF {
        0 => Cmp,
        4 => Tw,
        19 => Mfcr,
        20 => Lwarx,
        21 => Ldx,
        23 => Lwzx,
        24 => Slw,
        26 => Cntlzw,
        27 => Sld,
        28 => And,
        32 => Cmpl,
        53 => Ldux,
        54 => Dcbst,
        55 => Lwzux,
        58 => Cntlzd,
        60 => Andc,
        68 => Td,
        84 => Ldarx,
        86 => Dcbf,
        87 => Lbzx,
        103 => Lvx,
        119 => Lbzux,
        124 => Nor,
        144 => Mtcrf,
        149 => Stdx,
        150 => Stwcx,
        151 => Stwx,
        181 => Stdux,
        183 => Stwux,
        214 => Stdcx,
        215 => Stbx,
        231 => Stvx,
        246 => Dcbtst,
        247 => Stbux,
        278 => Dcbt,
        279 => Lhzx,
        284 => Eqv,
        311 => Lhzux,
        316 => Xor,
        339 => Mfspr,
        341 => Lwax,
        343 => Lhax,
        371 => Mftb,
        373 => Lwaux,
        375 => Lhaux,
        407 => Sthx,
        412 => Orc,
        439 => Sthux,
        444 => Or,
        467 => Mtspr,
        476 => Nand,
        534 => Lwbrx,
        535 => Lfsx,
        536 => Srw,
        539 => Srd,
        567 => Lfsux,
        598 => Sync,
        599 => Lfdx,
        631 => Lfdux,
        662 => Stwbrx,
        663 => Stfsx,
        695 => Stfsux,
        727 => Stfdx,
        759 => Stfdux,
        790 => Lhbrx,
        792 => Sraw,
        794 => Srad,
        824 => Srawi,
        854 => Eieio,
        918 => Sthbrx,
        922 => Extsh,
        954 => Extsb,
        982 => Icbi,
        986 => Extsw,
        1014 => Dcbz,
        _ => Unknown,
    };
    if x != Unknown {
        return x;
    }
    match (w >> 1) & 0x1FF {
        8 => Subfc,
        9 => Mulhdu,
        10 => Addc,
        11 => Mulhwu,
        40 => Subf,
        73 => Mulhd,
        75 => Mulhw,
        104 => Neg,
        136 => Subfe,
        138 => Adde,
        200 => Subfze,
        202 => Addze,
        232 => Subfme,
        233 => Mulld,
        234 => Addme,
        235 => Mullw,
        266 => Add,
        457 => Divdu,
        459 => Divwu,
        489 => Divd,
        491 => Divw,
        _ => Unknown,
    }
}

fn decode_59(w: u32) -> InsnClass {
    match (w >> 1) & 0x1F {
        18 => Fdivs,
        20 => Fsubs,
        21 => Fadds,
        22 => Fsqrts,
        25 => Fmuls,
        28 => Fmsubs,
        29 => Fmadds,
        _ => Unknown,
    }
}

fn decode_63(w: u32) -> InsnClass {
    let a = match (w >> 1) & 0x1F {
        18 => Fdiv,
        20 => Fsub,
        21 => Fadd,
        22 => Fsqrt,
        23 => Fsel,
        25 => Fmul,
        28 => Fmsub,
        29 => Fmadd,
        _ => Unknown,
    };
    if a != Unknown {
        return a;
    }
    match (w >> 1) & 0x3FF {
        0 => Fcmpu,
        12 => Frsp,
        15 => Fctiwz,
        32 => Fcmpo,
        38 => Mtfsb1,
        40 => Fneg,
        70 => Mtfsb0,
        72 => Fmr,
        136 => Fnabs,
        264 => Fabs,
        583 => Mffs,
        711 => Mtfsf,
        815 => Fctidz,
        846 => Fcfid,
        _ => Unknown,
    }
}

fn decode_vector(w: u32) -> InsnClass {
    match w & 0x3F {
        42 => return Vsel,
        43 => return Vperm,
        44 => return Vsldoi,
        46 => return Vmaddfp,
        47 => return Vnmsubfp,
        6 => {
            return match w & 0x3FF {
                6 => Vcmpequb,
                70 => Vcmpequh,
                134 => Vcmpequw,
                198 => Vcmpeqfp,
                454 => Vcmpgefp,
                518 => Vcmpgtub,
                582 => Vcmpgtuh,
                646 => Vcmpgtuw,
                710 => Vcmpgtfp,
                774 => Vcmpgtsb,
                838 => Vcmpgtsh,
                902 => Vcmpgtsw,
                _ => Unknown,
            }
        }
        x if x >= 32 => return Unknown,
        _ => {}
    }
    match w & 0x7FF {
        0 => Vaddubm,
        2 => Vmaxub,
        4 => Vrlb,
        10 => Vaddfp,
        64 => Vadduhm,
        66 => Vmaxuh,
        68 => Vrlh,
        74 => Vsubfp,
        128 => Vadduwm,
        130 => Vmaxuw,
        132 => Vrlw,
        258 => Vmaxsb,
        260 => Vslb,
        322 => Vmaxsh,
        324 => Vslh,
        386 => Vmaxsw,
        388 => Vslw,
        512 => Vaddubs,
        514 => Vminub,
        516 => Vsrb,
        524 => Vspltb,
        576 => Vadduhs,
        578 => Vminuh,
        580 => Vsrh,
        588 => Vsplth,
        640 => Vadduws,
        642 => Vminuw,
        644 => Vsrw,
        652 => Vspltw,
        768 => Vaddsbs,
        770 => Vminsb,
        772 => Vsrab,
        780 => Vspltisb,
        832 => Vaddshs,
        834 => Vminsh,
        836 => Vsrah,
        844 => Vspltish,
        896 => Vaddsws,
        898 => Vminsw,
        900 => Vsraw,
        908 => Vspltisw,
        1024 => Vsububm,
        1028 => Vand,
        1088 => Vsubuhm,
        1092 => Vandc,
        1152 => Vsubuwm,
        1156 => Vor,
        1220 => Vxor,
        1284 => Vnor,
        1536 => Vsububs,
        1540 => Mfvscr,
        1600 => Vsubuhs,
        1604 => Mtvscr,
        1664 => Vsubuws,
        1792 => Vsubsbs,
        1856 => Vsubshs,
        1920 => Vsubsws,
        _ => Unknown,
    }
}
