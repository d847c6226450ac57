//! PPU (64-bit PowerPC with VMX) disassembler.

use ppujit_decode::class::InsnClass::{self, *};
use ppujit_decode::fields::{bo, spr};
use ppujit_decode::{decode, Insn};

fn spr_name(n: u32) -> Option<&'static str> {
    Some(match n {
        spr::XER => "xer",
        spr::LR => "lr",
        spr::CTR => "ctr",
        spr::VRSAVE => "vrsave",
        spr::TBL => "tbl",
        spr::TBU => "tbu",
        272 => "sprg0",
        273 => "sprg1",
        274 => "sprg2",
        275 => "sprg3",
        _ => return None,
    })
}

/// Disassemble one big-endian instruction at `pc`.
///
/// `data` must contain at least 4 bytes. Returns
/// `(assembly_text, instruction_length_in_bytes)`.
pub fn print_insn_ppc64(pc: u64, data: &[u8]) -> (String, usize) {
    match data.get(..4) {
        Some(b) => {
            let word = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
            (disas_word(pc as u32, word), 4)
        }
        None => (".byte ???".into(), 0),
    }
}

/// Disassemble an already-fetched instruction word.
pub fn disas_word(pc: u32, word: u32) -> String {
    let insn = decode(word);
    let c = insn.class;
    if c == Unknown {
        return format!(".long {word:#010x}");
    }
    if c.is_branch() {
        return disas_branch(&insn, pc);
    }
    let dot = |rc: bool| if rc { "." } else { "" };
    let (rt, ra, rb) = (insn.rt(), insn.ra(), insn.rb());
    let name = c.name();
    match c {
        // -- D-form arithmetic and logic --
        Addi if ra == 0 => format!("li r{rt}, {}", insn.simm()),
        Addis if ra == 0 => format!("lis r{rt}, {}", insn.simm()),
        Addi | Addis | Addic | AddicRc | Subfic | Mulli => {
            format!("{name} r{rt}, r{ra}, {}", insn.simm())
        }
        Ori if rt == 0 && ra == 0 && insn.uimm() == 0 => "nop".into(),
        Ori | Oris | Xori | Xoris | AndiRc | AndisRc => {
            format!("{name} r{ra}, r{rt}, {:#x}", insn.uimm())
        }
        Cmpi | Cmpli => {
            let w = if insn.cmp_l() { "d" } else { "w" };
            let base = if c == Cmpi { "cmp" } else { "cmpl" };
            let imm = if c == Cmpi {
                insn.simm().to_string()
            } else {
                format!("{:#x}", insn.uimm())
            };
            format!("{base}{w}i cr{}, r{ra}, {imm}", insn.crfd())
        }
        Cmp | Cmpl => {
            let w = if insn.cmp_l() { "d" } else { "w" };
            format!("{name}{w} cr{}, r{ra}, r{rb}", insn.crfd())
        }
        Twi | Tdi => format!("{name} {}, r{ra}, {}", insn.to(), insn.simm()),
        Tw | Td => format!("{name} {}, r{ra}, r{rb}", insn.to()),

        // -- XO-form --
        Add | Addc | Adde | Subf | Subfc | Subfe | Mullw | Mulld | Mulhw
        | Mulhwu | Mulhd | Mulhdu | Divw | Divwu | Divd | Divdu => {
            let o = if insn.oe() { "o" } else { "" };
            format!("{name}{o}{} r{rt}, r{ra}, r{rb}", dot(insn.rc()))
        }
        Addze | Addme | Subfze | Subfme | Neg => {
            let o = if insn.oe() { "o" } else { "" };
            format!("{name}{o}{} r{rt}, r{ra}", dot(insn.rc()))
        }

        // -- X-form logic and shifts (RS, RA, RB) --
        Or if rt == rb => format!("mr{} r{ra}, r{rt}", dot(insn.rc())),
        And | Andc | Or | Orc | Xor | Nor | Nand | Eqv | Slw | Srw | Sraw
        | Sld | Srd | Srad => {
            format!("{name}{} r{ra}, r{rt}, r{rb}", dot(insn.rc()))
        }
        Srawi => format!("{name}{} r{ra}, r{rt}, {}", dot(insn.rc()), insn.sh32()),
        Sradi => format!("{name}{} r{ra}, r{rt}, {}", dot(insn.rc()), insn.sh64()),
        Cntlzw | Cntlzd | Extsb | Extsh | Extsw => {
            format!("{name}{} r{ra}, r{rt}", dot(insn.rc()))
        }

        // -- Rotates --
        Rlwinm | Rlwimi => format!(
            "{name}{} r{ra}, r{rt}, {}, {}, {}",
            dot(insn.rc()),
            insn.sh32(),
            insn.mb32(),
            insn.me32()
        ),
        Rlwnm => format!(
            "{name}{} r{ra}, r{rt}, r{rb}, {}, {}",
            dot(insn.rc()),
            insn.mb32(),
            insn.me32()
        ),
        Rldicl | Rldicr | Rldic | Rldimi => format!(
            "{name}{} r{ra}, r{rt}, {}, {}",
            dot(insn.rc()),
            insn.sh64(),
            insn.mb64()
        ),
        Rldcl | Rldcr => format!(
            "{name}{} r{ra}, r{rt}, r{rb}, {}",
            dot(insn.rc()),
            insn.mb64()
        ),

        // -- CR and SPR --
        Mcrf => format!("mcrf cr{}, cr{}", insn.crfd(), insn.crfs()),
        Crand | Cror | Crxor | Crnand | Crnor | Creqv | Crandc | Crorc => {
            format!("{name} {}, {}, {}", insn.crbd(), insn.crba(), insn.crbb())
        }
        Mfcr => format!("mfcr r{rt}"),
        Mtcrf => format!("mtcrf {:#x}, r{rt}", insn.crm()),
        Mfspr => match spr_name(insn.spr()) {
            Some(s) => format!("mf{s} r{rt}"),
            None => format!("mfspr r{rt}, {}", insn.spr()),
        },
        Mtspr => match spr_name(insn.spr()) {
            Some(s) => format!("mt{s} r{rt}"),
            None => format!("mtspr {}, r{rt}", insn.spr()),
        },
        Mftb => format!("mftb r{rt}, {}", insn.spr()),

        // -- System --
        Sc => "sc".into(),
        Sync | Isync | Eieio => name.into(),
        Dcbt | Dcbtst | Dcbf | Dcbst | Dcbz | Icbi => format!("{name} r{ra}, r{rb}"),

        // -- Loads and stores --
        Lwz | Lwzu | Lbz | Lbzu | Stw | Stwu | Stb | Stbu | Lhz | Lhzu | Lha
        | Lhau | Sth | Sthu | Lmw | Stmw => {
            format!("{name} r{rt}, {}(r{ra})", insn.simm())
        }
        Ld | Ldu | Lwa | Std | Stdu => format!("{name} r{rt}, {}(r{ra})", insn.ds()),
        Lfs | Lfsu | Lfd | Lfdu | Stfs | Stfsu | Stfd | Stfdu => {
            format!("{name} f{rt}, {}(r{ra})", insn.simm())
        }
        Lfsx | Lfsux | Lfdx | Lfdux | Stfsx | Stfsux | Stfdx | Stfdux => {
            format!("{name} f{rt}, r{ra}, r{rb}")
        }
        Lvx | Stvx => format!("{name} v{rt}, r{ra}, r{rb}"),
        Lbzx | Lbzux | Lhzx | Lhzux | Lhax | Lhaux | Lwzx | Lwzux | Lwax
        | Lwaux | Ldx | Ldux | Stbx | Stbux | Sthx | Sthux | Stwx | Stwux
        | Stdx | Stdux | Lhbrx | Lwbrx | Sthbrx | Stwbrx | Lwarx | Ldarx
        | Stwcx | Stdcx => format!("{name} r{rt}, r{ra}, r{rb}"),

        // -- Float --
        Fmadd | Fmsub | Fmadds | Fmsubs | Fsel => format!(
            "{name}{} f{rt}, f{ra}, f{}, f{rb}",
            dot(insn.rc()),
            insn.rc_reg()
        ),
        Fmul | Fmuls => format!(
            "{name}{} f{rt}, f{ra}, f{}",
            dot(insn.rc()),
            insn.rc_reg()
        ),
        Fadd | Fsub | Fdiv | Fadds | Fsubs | Fdivs => {
            format!("{name}{} f{rt}, f{ra}, f{rb}", dot(insn.rc()))
        }
        Fsqrt | Fsqrts | Fmr | Fneg | Fabs | Fnabs | Frsp | Fctiwz | Fctidz
        | Fcfid => format!("{name}{} f{rt}, f{rb}", dot(insn.rc())),
        Fcmpu | Fcmpo => format!("{name} cr{}, f{ra}, f{rb}", insn.crfd()),
        Mffs => format!("mffs{} f{rt}", dot(insn.rc())),
        Mtfsf => format!("mtfsf{} {:#x}, f{rb}", dot(insn.rc()), insn.fm()),
        Mtfsb0 | Mtfsb1 => format!("{name}{} {}", dot(insn.rc()), insn.crbd()),

        // -- Vector --
        Vsel | Vperm | Vmaddfp | Vnmsubfp => format!(
            "{name} v{rt}, v{ra}, v{rb}, v{}",
            insn.vc()
        ),
        Vsldoi => format!("vsldoi v{rt}, v{ra}, v{rb}, {}", insn.vshb()),
        Vspltb | Vsplth | Vspltw => format!("{name} v{rt}, v{rb}, {}", insn.vuimm()),
        Vspltisb | Vspltish | Vspltisw => format!("{name} v{rt}, {}", insn.vsimm()),
        Mfvscr => format!("mfvscr v{rt}"),
        Mtvscr => format!("mtvscr v{rb}"),
        c if c.form() == ppujit_decode::Form::Vc => {
            format!("{name}{} v{rt}, v{ra}, v{rb}", dot(insn.vrc()))
        }
        _ => format!("{name} v{rt}, v{ra}, v{rb}"),
    }
}

fn disas_branch(insn: &Insn, pc: u32) -> String {
    let lk = if insn.lk() { "l" } else { "" };
    let a = if insn.aa() { "a" } else { "" };
    let (bo_f, bi) = (insn.bo(), insn.bi());
    let cond = |bo_f: u32, bi: u32| -> String {
        if bo_f & bo::ALWAYS == bo::ALWAYS {
            return String::new();
        }
        let mut s = String::new();
        if bo_f & bo::NO_CTR == 0 {
            s.push_str(if bo_f & bo::CTR_ZERO != 0 { "dz" } else { "dnz" });
        }
        if bo_f & bo::NO_COND == 0 {
            let bit = ["lt", "gt", "eq", "so"][(bi & 3) as usize];
            let t = if bo_f & bo::COND_TRUE != 0 { "" } else { "!" };
            s.push_str(&format!("({t}cr{}.{bit})", bi >> 2));
        }
        s
    };
    match insn.class {
        InsnClass::B => format!("b{lk}{a} {:#x}", insn.branch_target(pc)),
        InsnClass::Bc => format!(
            "bc{}{lk}{a} {:#x}",
            cond(bo_f, bi),
            insn.branch_target(pc)
        ),
        InsnClass::Bclr => format!("b{}lr{lk}", cond(bo_f, bi)),
        _ => format!("b{}ctr{lk}", cond(bo_f, bi)),
    }
}
