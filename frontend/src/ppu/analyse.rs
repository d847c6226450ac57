//! Block pre-scan.
//!
//! Walks guest words from the entry address until the first
//! terminator and records what the lowering pass needs up front: the
//! words themselves, the extent of the unit, and every branch target
//! so labels can exist before the branches that use them.

use std::collections::BTreeSet;

use ppujit_core::runtime::GuestMemory;
use ppujit_decode::class::InsnClass;
use ppujit_decode::fields::bo;
use ppujit_decode::{decode, Insn};

/// Static facts about one unit of guest code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInfo {
    /// Entry address.
    pub start: u32,
    /// Instruction words in program order.
    pub words: Vec<u32>,
    /// Targets of `bl`/`bcl` found in the unit, in program order.
    pub callees: Vec<u32>,
    /// Targets of branches without link.
    pub branch_targets: BTreeSet<u32>,
    /// The unit contains a computed branch through CTR.
    pub has_indirect: bool,
    /// The unit contains an unconditional return through LR.
    pub returns: bool,
    /// Class of the instruction that ended the scan, if any.
    pub terminator: Option<InsnClass>,
}

impl BlockInfo {
    pub fn icount(&self) -> u32 {
        self.words.len() as u32
    }

    /// Bytes of guest code covered.
    pub fn size(&self) -> u32 {
        self.icount() * 4
    }

    /// One past the last covered byte.
    pub fn end(&self) -> u32 {
        self.start.wrapping_add(self.size())
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr.wrapping_sub(self.start) < self.size()
    }

    /// Whether a branch at `pc` to `target` stays inside the unit.
    ///
    /// Backward targets only need to be covered; forward targets must
    /// also lie within `window` bytes of the branch.
    pub fn is_local(&self, pc: u32, target: u32, window: u32) -> bool {
        if !self.contains(target) || target & 3 != 0 {
            return false;
        }
        target <= pc || target - pc <= window
    }
}

fn always(bo_f: u32) -> bool {
    bo_f & bo::ALWAYS == bo::ALWAYS
}

/// Scan at most `max_insns` words from `start`.
///
/// The scan stops after an unknown word, an invalid `bcctr`, or an
/// unconditional transfer that no pending forward branch jumps past.
pub fn analyse_block(
    mem: &dyn GuestMemory,
    start: u32,
    max_insns: u32,
    window: u32,
) -> BlockInfo {
    let mut info = BlockInfo {
        start,
        ..BlockInfo::default()
    };
    // Forward local targets not reached yet.
    let mut pending: BTreeSet<u32> = BTreeSet::new();

    while info.icount() < max_insns.max(1) {
        let pc = info.end();
        let word = mem.fetch32(pc);
        let insn = decode(word);
        info.words.push(word);
        pending = pending.split_off(&pc.wrapping_add(1));

        let unconditional = match insn.class {
            InsnClass::Unknown => {
                info.terminator = Some(InsnClass::Unknown);
                break;
            }
            InsnClass::B | InsnClass::Bc => {
                let target = insn.branch_target(pc);
                if insn.lk() {
                    info.callees.push(target);
                    false
                } else {
                    info.branch_targets.insert(target);
                    if target > pc && target - pc <= window {
                        pending.insert(target);
                    }
                    insn.class == InsnClass::B || always(insn.bo())
                }
            }
            InsnClass::Bclr => {
                let uncond = !insn.lk() && always(insn.bo());
                info.returns |= uncond;
                uncond
            }
            InsnClass::Bcctr => {
                info.has_indirect = true;
                if insn.bo() & bo::NO_CTR == 0 {
                    info.terminator = Some(InsnClass::Bcctr);
                    break;
                }
                !insn.lk() && always(insn.bo())
            }
            _ => false,
        };

        if unconditional && pending.is_empty() {
            info.terminator = Some(insn.class);
            break;
        }
    }
    info
}

/// Decoded instruction at index `i` of `info`.
pub(crate) fn insn_at(info: &BlockInfo, i: usize) -> Insn {
    decode(info.words[i])
}
