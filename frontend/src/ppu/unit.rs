//! Control-flow assembler for one unit.
//!
//! Tracks the three phases of a unit (entry, accumulating, terminal),
//! owns the label for every local branch target, and keeps the
//! end-of-if and else queues that define the nesting level.
//!
//! A forward conditional branch opens a region that closes at its
//! target; a forward unconditional branch (the jump over an else
//! arm) opens another. Each region raises the nesting level by one
//! and the level drops back when the instruction at the region's
//! target starts. A well-formed unit is back at level 1 when its
//! terminal instruction is lowered.

use std::collections::BTreeMap;

use ppujit_core::Context;
use tracing::error;

/// Phase of a unit under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing emitted yet.
    Entry,
    /// Lowering instructions.
    Accumulating,
    /// The terminal instruction has been lowered.
    Terminal,
}

#[derive(Debug)]
pub struct UnitAssembler {
    phase: Phase,
    /// Local branch target → label id.
    labels: BTreeMap<u32, u32>,
    /// Offsets where a conditional region closes.
    end_queue: Vec<u32>,
    /// Offsets where an else region closes.
    else_queue: Vec<u32>,
    nesting: u32,
}

impl UnitAssembler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Entry,
            labels: BTreeMap::new(),
            end_queue: Vec::new(),
            else_queue: Vec::new(),
            nesting: 1,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn nesting(&self) -> u32 {
        self.nesting
    }

    /// Create labels for every local target before lowering starts.
    pub fn declare_targets(&mut self, ir: &mut Context, targets: impl IntoIterator<Item = u32>) {
        for t in targets {
            self.labels.entry(t).or_insert_with(|| ir.new_label());
        }
    }

    pub fn label_for(&self, target: u32) -> Option<u32> {
        self.labels.get(&target).copied()
    }

    /// Start of the instruction at `pc`: close any regions ending
    /// here and place the label for `pc` if it is a branch target.
    pub fn begin_insn(&mut self, ir: &mut Context, pc: u32) {
        if self.phase == Phase::Entry {
            self.phase = Phase::Accumulating;
        }
        for queue in [&mut self.end_queue, &mut self.else_queue] {
            let before = queue.len();
            queue.retain(|&off| off != pc);
            self.nesting -= (before - queue.len()) as u32;
        }
        if let Some(&label) = self.labels.get(&pc) {
            ir.gen_set_label(label);
        }
    }

    /// A forward conditional branch to `target` opens a region.
    pub fn open_if(&mut self, target: u32) {
        self.end_queue.push(target);
        self.nesting += 1;
    }

    /// A forward unconditional branch to `target` opens an else
    /// region.
    pub fn open_else(&mut self, target: u32) {
        self.else_queue.push(target);
        self.nesting += 1;
    }

    /// Move to the terminal phase. Returns `false` if regions are
    /// still open.
    pub fn terminate(&mut self, pc: u32) -> bool {
        self.phase = Phase::Terminal;
        if self.nesting != 1 {
            error!(
                pc = format_args!("{pc:#010x}"),
                nesting = self.nesting,
                "unit ended with open branch regions"
            );
            return false;
        }
        true
    }
}

impl Default for UnitAssembler {
    fn default() -> Self {
        Self::new()
    }
}
