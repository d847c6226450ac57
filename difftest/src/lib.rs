//! Differential testing of direct lowerings against the interpreter.
//!
//! Each case compiles a single instruction into a one-instruction
//! unit, runs it from a random register file, then reloads the same
//! input and steps the reference interpreter over the same word. The
//! two resulting states (and the scratch memory window) must be
//! identical. Random input comes from a fixed-seed generator, so a
//! failing case is reproduced by rerunning with the same seed.
//!
//! A mismatch is reported and marks its class as failing; the run
//! continues.

pub mod report;
pub mod sampler;
pub mod state_gen;

use std::cell::Cell;
use std::sync::{Mutex, PoisonError};

use ppujit_backend::{CodegenError, ThreadedCodeGen};
use ppujit_core::{Context, GuestMemory, Runtime, StopReason, EXIT_HALT};
use ppujit_decode::class::InsnClass;
use ppujit_frontend::{has_direct_lowering, translate_block, CompileDiagnostics, LowerConfig};
use ppujit_guest::{interp, CpuState, GuestRam, LoadError, Status};
use tracing::{debug, warn};

pub use report::{ClassReport, Mismatch, Report};
pub use sampler::{CODE_BASE, DATA_BASE, DATA_LEN};
pub use state_gen::StateGen;

/// Guest RAM backing the harness.
const RAM_SIZE: usize = 0x0010_0000;
/// Memory differences listed per mismatch.
const MAX_MEM_DIFFS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct DiffConfig {
    pub seed: u64,
    pub cases_per_class: u32,
    /// Run the IR optimizer before code generation.
    pub optimize: bool,
    /// Mismatches kept with full dumps per class.
    pub max_samples: usize,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED_C311,
            cases_per_class: 64,
            optimize: true,
            max_samples: 4,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("no valid encoding found for {0}")]
    NoEncoding(InsnClass),
    #[error("lowering of {word:#010x} reported: {msg}")]
    Lowering { word: u32, msg: String },
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Result of comparing one word on one input.
#[derive(Debug)]
pub enum Outcome {
    Match,
    /// The interpreter did not complete the instruction normally.
    Skipped(Status),
    Mismatch {
        compiled: Box<CpuState>,
        interpreted: Box<CpuState>,
        diffs: Vec<String>,
    },
}

/// Keeps the first diagnostic raised while lowering.
#[derive(Default)]
struct FirstDiagnostic(Mutex<Option<String>>);

impl FirstDiagnostic {
    fn note(&self, msg: String) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert(msg);
    }

    fn take(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl CompileDiagnostics for FirstDiagnostic {
    fn compilation_error(&self, _addr: u32, msg: &str) {
        self.note(msg.to_string());
    }

    fn unknown_instruction(&self, _addr: u32, word: u32) {
        self.note(format!("unknown word {word:#010x}"));
    }
}

/// Runtime seen by the unit under test. Block-cache calls are not
/// followed: the unit halts with `pc` at the callee, which is where
/// the interpreter leaves it too.
struct Probe<'a> {
    mem: &'a GuestRam,
    calls: Cell<u32>,
    stop: Cell<Option<StopReason>>,
}

impl<'a> Probe<'a> {
    fn new(mem: &'a GuestRam) -> Self {
        Self {
            mem,
            calls: Cell::new(0),
            stop: Cell::new(None),
        }
    }
}

impl Runtime for Probe<'_> {
    fn memory(&self) -> &dyn GuestMemory {
        self.mem
    }

    unsafe fn call_block(&self, _env: *mut u8, _addr: u32) -> u32 {
        self.calls.set(self.calls.get() + 1);
        EXIT_HALT
    }

    unsafe fn system_call(&self, _env: *mut u8) -> bool {
        false
    }

    fn stop(&self, reason: StopReason) {
        self.stop.set(Some(reason));
    }
}

pub struct Harness {
    cfg: DiffConfig,
    ram: GuestRam,
    ir: Context,
    backend: ThreadedCodeGen,
    gen: StateGen,
}

impl Harness {
    pub fn new(cfg: DiffConfig) -> Result<Self, HarnessError> {
        Ok(Self {
            ram: GuestRam::new(RAM_SIZE)?,
            ir: Context::new(),
            backend: ThreadedCodeGen::new(),
            gen: StateGen::new(cfg.seed),
            cfg,
        })
    }

    pub fn config(&self) -> &DiffConfig {
        &self.cfg
    }

    /// Every class with a direct lowering.
    pub fn classes() -> Vec<InsnClass> {
        InsnClass::ALL
            .iter()
            .copied()
            .filter(|&c| has_direct_lowering(c))
            .collect()
    }

    /// Sweep every directly lowered class.
    pub fn run(&mut self) -> Report {
        self.run_classes(&Self::classes())
    }

    pub fn run_classes(&mut self, classes: &[InsnClass]) -> Report {
        let classes = classes.iter().map(|&c| self.run_class(c)).collect();
        Report {
            seed: self.cfg.seed,
            classes,
        }
    }

    pub fn run_class(&mut self, class: InsnClass) -> ClassReport {
        let mut rep = ClassReport::new(class);
        let mut data = vec![0u8; DATA_LEN];
        for case in 0..self.cfg.cases_per_class {
            let Some(word) = sampler::sample_word(self.gen.rng(), class) else {
                rep.error = Some(HarnessError::NoEncoding(class).to_string());
                break;
            };
            let mut input = self.gen.next_state();
            sampler::fix_state(self.gen.rng(), word, &mut input);
            self.gen.fill(&mut data);

            match self.check(word, &input, &data) {
                Ok(Outcome::Match) => rep.cases += 1,
                Ok(Outcome::Skipped(status)) => {
                    debug!(%class, word = format_args!("{word:#010x}"), ?status, "case skipped");
                    rep.skipped += 1;
                }
                Ok(Outcome::Mismatch {
                    compiled,
                    interpreted,
                    diffs,
                }) => {
                    rep.cases += 1;
                    rep.mismatches += 1;
                    let m = Mismatch {
                        class,
                        word,
                        case,
                        input,
                        compiled: *compiled,
                        interpreted: *interpreted,
                        diffs,
                    };
                    warn!("lowering mismatch\n{m}");
                    if rep.samples.len() < self.cfg.max_samples {
                        rep.samples.push(m);
                    }
                }
                Err(e) => {
                    rep.error = Some(e.to_string());
                    break;
                }
            }
        }
        rep
    }

    /// Compare the compiled and interpreted effect of `word` on
    /// `input`, with `data` loaded into the scratch window.
    pub fn check(
        &mut self,
        word: u32,
        input: &CpuState,
        data: &[u8],
    ) -> Result<Outcome, HarnessError> {
        self.ram.write_words(CODE_BASE, &[word])?;
        let lower = LowerConfig {
            max_insns: 1,
            ..LowerConfig::default()
        };
        let diag = FirstDiagnostic::default();
        translate_block(&mut self.ir, &self.ram, CODE_BASE, &lower, &diag, None);
        if let Some(msg) = diag.take() {
            return Err(HarnessError::Lowering { word, msg });
        }
        let code = ppujit_backend::translate(&mut self.ir, &self.backend, self.cfg.optimize)?;

        // Compiled run.
        self.ram.load_image(DATA_BASE, data)?;
        let mut compiled = input.clone();
        compiled.pc = CODE_BASE as u64;
        let probe = Probe::new(&self.ram);
        // SAFETY: `compiled` is a live register file owned by this
        // frame and not otherwise borrowed during the call.
        let exit = unsafe { code.call(compiled.as_env_ptr(), &probe) };
        let compiled_mem = self.ram.snapshot(DATA_BASE, DATA_LEN);

        // Reference run from the same input.
        self.ram.write_words(CODE_BASE, &[word])?;
        self.ram.load_image(DATA_BASE, data)?;
        let mut interpreted = input.clone();
        interpreted.pc = CODE_BASE as u64;
        let status = interp::step(&mut interpreted, &self.ram);
        if matches!(status, Status::Trap | Status::Illegal | Status::Syscall) {
            return Ok(Outcome::Skipped(status));
        }
        let interpreted_mem = self.ram.snapshot(DATA_BASE, DATA_LEN);

        let mut diffs = compiled.diff(&interpreted);
        if let Some(reason) = probe.stop.get() {
            diffs.push(format!("compiled unit stopped ({reason:?}), exit {exit:#x}"));
        }
        if probe.calls.get() > 0 && status != Status::Call {
            diffs.push("compiled unit made a call the interpreter did not".to_string());
        }
        diffs.extend(
            compiled_mem
                .iter()
                .zip(&interpreted_mem)
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .take(MAX_MEM_DIFFS)
                .map(|(i, (a, b))| {
                    format!("mem[{:#010x}]: {a:#04x} != {b:#04x}", DATA_BASE as usize + i)
                }),
        );

        if diffs.is_empty() {
            Ok(Outcome::Match)
        } else {
            Ok(Outcome::Mismatch {
                compiled: Box::new(compiled),
                interpreted: Box::new(interpreted),
                diffs,
            })
        }
    }
}
