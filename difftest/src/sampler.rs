//! Random instruction words per class, plus the register fixups that
//! keep memory operands inside the scratch window.

use ppujit_decode::class::{Form, InsnClass};
use ppujit_decode::encode::xfx_spr;
use ppujit_decode::fields::{bo, spr};
use ppujit_decode::{decode, Insn};
use ppujit_guest::CpuState;
use rand::Rng;

/// Where the instruction under test is placed.
pub const CODE_BASE: u32 = 0x0001_0000;
/// Scratch window loads and stores are steered into.
pub const DATA_BASE: u32 = 0x0002_0000;
pub const DATA_LEN: usize = 0x800;
/// Base register value for memory forms; the displacement and index
/// stay within 0x200 of it.
const DATA_ANCHOR: u32 = DATA_BASE + 0x400;

const ENCODE_ATTEMPTS: u32 = 64;

const SPRS: [u32; 8] = [
    spr::XER,
    spr::LR,
    spr::CTR,
    spr::VRSAVE,
    spr::SPRG0,
    spr::SPRG0 + 1,
    spr::SPRG0 + 2,
    spr::SPRG3,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemKind {
    /// `(d)rA` or `(ds)rA`.
    Displacement,
    /// `rA + rB`.
    Indexed,
}

fn mem_kind(class: InsnClass) -> Option<MemKind> {
    match class.form() {
        Form::D if (32..=55).contains(&class.primary()) => Some(MemKind::Displacement),
        Form::Ds => Some(MemKind::Displacement),
        Form::X => {
            let name = class.name();
            (name.starts_with('l') || name.starts_with("st")).then_some(MemKind::Indexed)
        }
        _ => None,
    }
}

fn set_field(word: u32, shift: u32, val: u32) -> u32 {
    (word & !(0x1F << shift)) | ((val & 0x1F) << shift)
}

/// Register number in `1..32` not in `avoid`.
fn pick_reg<R: Rng>(rng: &mut R, avoid: &[usize]) -> u32 {
    loop {
        let r = rng.gen_range(1..32usize);
        if !avoid.contains(&r) {
            return r as u32;
        }
    }
}

fn fix_memory<R: Rng>(rng: &mut R, kind: MemKind, mut word: u32) -> u32 {
    let insn = Insn::new(word, InsnClass::Unknown);
    let ra = pick_reg(rng, &[insn.rt()]);
    word = set_field(word, 16, ra);
    match kind {
        MemKind::Displacement => {
            let disp = rng.gen_range(-32..32i32) * 8;
            word = (word & !0xFFFC) | (disp as u32 & 0xFFFC);
        }
        MemKind::Indexed => {
            let rb = pick_reg(rng, &[ra as usize]);
            word = set_field(word, 11, rb);
        }
    }
    word
}

fn fix_word<R: Rng>(rng: &mut R, class: InsnClass, mut word: u32) -> u32 {
    if let Some(kind) = mem_kind(class) {
        word = fix_memory(rng, kind, word);
    }
    match class {
        InsnClass::Mfspr | InsnClass::Mtspr => {
            let n = SPRS[rng.gen_range(0..SPRS.len())];
            word = (word & !(0x3FF << 11)) | (xfx_spr(0, n, 0) & (0x3FF << 11));
        }
        // The CTR-decrementing form is invalid for bcctr.
        InsnClass::Bcctr => word |= bo::NO_CTR << 21,
        _ => {}
    }
    word
}

/// A random word of `class`, or `None` if no valid encoding turned
/// up. Direct branches never target their own address.
pub fn sample_word<R: Rng>(rng: &mut R, class: InsnClass) -> Option<u32> {
    let fixed = class.mask();
    for _ in 0..ENCODE_ATTEMPTS {
        let raw = class.template() | (rng.gen::<u32>() & !fixed);
        let word = fix_word(rng, class, raw);
        let insn = decode(word);
        if insn.class != class {
            continue;
        }
        if matches!(class, InsnClass::B | InsnClass::Bc) && insn.branch_target(CODE_BASE) == CODE_BASE
        {
            continue;
        }
        return Some(word);
    }
    None
}

/// Point the base and index registers of a memory form at the
/// scratch window.
pub fn fix_state<R: Rng>(rng: &mut R, word: u32, state: &mut CpuState) {
    let insn = decode(word);
    let Some(kind) = mem_kind(insn.class) else {
        return;
    };
    state.gpr[insn.ra()] = (DATA_ANCHOR + rng.gen_range(0..0x20u32) * 8) as u64;
    if kind == MemKind::Indexed {
        state.gpr[insn.rb()] = rng.gen_range(0..0x20u64) * 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn memory_operands_land_in_window() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for class in [InsnClass::Lwz, InsnClass::Std, InsnClass::Lwzx, InsnClass::Stbux] {
            for _ in 0..32 {
                let word = sample_word(&mut rng, class).unwrap();
                let insn = decode(word);
                let mut s = CpuState::new();
                fix_state(&mut rng, word, &mut s);
                let ea = if mem_kind(class) == Some(MemKind::Indexed) {
                    s.gpr[insn.ra()] + s.gpr[insn.rb()]
                } else {
                    s.gpr[insn.ra()].wrapping_add(insn.simm() as u64)
                };
                let lo = DATA_BASE as u64;
                let hi = lo + DATA_LEN as u64 - 16;
                assert!((lo..hi).contains(&ea), "{class}: ea {ea:#x}");
            }
        }
    }

    #[test]
    fn direct_branches_avoid_self() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        for _ in 0..256 {
            let word = sample_word(&mut rng, InsnClass::B).unwrap();
            assert_ne!(decode(word).branch_target(CODE_BASE), CODE_BASE);
        }
    }
}
