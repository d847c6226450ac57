//! Sweep results and mismatch dumps.

use std::fmt;

use ppujit_decode::class::InsnClass;
use ppujit_disas::disas_word;
use ppujit_guest::CpuState;

use crate::sampler::CODE_BASE;

/// One compiled-versus-interpreted disagreement.
#[derive(Clone)]
pub struct Mismatch {
    pub class: InsnClass,
    pub word: u32,
    /// Index of the case within its class sweep.
    pub case: u32,
    pub input: CpuState,
    pub compiled: CpuState,
    pub interpreted: CpuState,
    /// `compiled != interpreted` lines, registers first, then memory.
    pub diffs: Vec<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} case {}: {:08x}  {}",
            self.class,
            self.case,
            self.word,
            disas_word(CODE_BASE, self.word)
        )?;
        for d in &self.diffs {
            writeln!(f, "  {d}")?;
        }
        writeln!(f, "-- input --\n{:?}", self.input)?;
        writeln!(f, "-- compiled --\n{:?}", self.compiled)?;
        write!(f, "-- interpreter --\n{:?}", self.interpreted)
    }
}

impl fmt::Debug for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Results for one instruction class.
#[derive(Debug, Clone)]
pub struct ClassReport {
    pub class: InsnClass,
    /// Cases compared.
    pub cases: u32,
    /// Cases the interpreter refused (trap, illegal form).
    pub skipped: u32,
    pub mismatches: u32,
    /// The first few mismatches, with full dumps.
    pub samples: Vec<Mismatch>,
    /// Set when the class could not be exercised at all.
    pub error: Option<String>,
}

impl ClassReport {
    pub fn new(class: InsnClass) -> Self {
        Self {
            class,
            cases: 0,
            skipped: 0,
            mismatches: 0,
            samples: Vec::new(),
            error: None,
        }
    }

    pub fn is_failing(&self) -> bool {
        self.mismatches != 0 || self.error.is_some()
    }
}

/// Results of a sweep.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub seed: u64,
    pub classes: Vec<ClassReport>,
}

impl Report {
    pub fn total_cases(&self) -> u64 {
        self.classes.iter().map(|c| c.cases as u64).sum()
    }

    pub fn total_mismatches(&self) -> u64 {
        self.classes.iter().map(|c| c.mismatches as u64).sum()
    }

    /// Classes marked broken.
    pub fn failing(&self) -> Vec<InsnClass> {
        self.classes
            .iter()
            .filter(|c| c.is_failing())
            .map(|c| c.class)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.classes.iter().all(|c| !c.is_failing())
    }

    pub fn class(&self, class: InsnClass) -> Option<&ClassReport> {
        self.classes.iter().find(|c| c.class == class)
    }

    /// One line per class, failing ones flagged.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "seed {:#x}: {} classes, {} cases, {} mismatches\n",
            self.seed,
            self.classes.len(),
            self.total_cases(),
            self.total_mismatches()
        );
        for c in &self.classes {
            let tag = if c.is_failing() { "FAIL" } else { "ok" };
            out.push_str(&format!(
                "{tag:>4} {:<10} cases={} skipped={} mismatches={}",
                c.class.name(),
                c.cases,
                c.skipped,
                c.mismatches
            ));
            if let Some(e) = &c.error {
                out.push_str(&format!(" error: {e}"));
            }
            out.push('\n');
        }
        out
    }
}
