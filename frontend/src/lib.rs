//! Guest instruction lowering.
//!
//! Provides the generic translation framework (`TranslatorOps` trait
//! and `translator_loop`), the diagnostics and profiling seams the
//! translator reports through, and the PPU frontend.

pub mod ppu;

use ppujit_core::Context;
use tracing::{error, warn};

pub use ppu::{has_direct_lowering, translate_block, BlockInfo, LowerConfig, TranslatedBlock};

// ---------------------------------------------------------------
// Generic translation framework
// ---------------------------------------------------------------

/// Unit termination reason set by `translate_insn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisasJumpType {
    /// Continue to the next sequential instruction.
    Next,
    /// Reached the end of the scanned block without a terminator.
    TooMany,
    /// Unconditional branch / exit; no fall-through.
    NoReturn,
}

/// Base context shared by all guest architectures.
pub struct DisasContextBase {
    /// PC of the first instruction in this unit.
    pub pc_first: u32,
    /// PC of the *next* instruction to decode.
    pub pc_next: u32,
    /// How the current instruction terminates.
    pub is_jmp: DisasJumpType,
    /// Number of guest instructions translated so far.
    pub num_insns: u32,
    /// Maximum instructions allowed in one unit.
    pub max_insns: u32,
}

/// Per-architecture translation operations.
pub trait TranslatorOps {
    /// Architecture-specific disassembly context.
    type DisasContext;

    /// One-time setup before the translation loop.
    fn init_disas_context(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Called once at the start of the unit (after init).
    fn tb_start(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Emit `insn_start` marker for the current guest PC.
    fn insn_start(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Decode and translate one guest instruction.
    ///
    /// Must advance `base().pc_next` and set `base().is_jmp`
    /// when the instruction terminates the unit.
    fn translate_insn(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Emit the unit epilogue (exit for fall-through).
    fn tb_stop(ctx: &mut Self::DisasContext, ir: &mut Context);

    /// Access the base context embedded in the arch context.
    fn base(ctx: &Self::DisasContext) -> &DisasContextBase;

    /// Mutable access to the base context.
    fn base_mut(ctx: &mut Self::DisasContext) -> &mut DisasContextBase;
}

/// Generic translation loop; drives the decode → translate cycle.
pub fn translator_loop<T: TranslatorOps>(
    ctx: &mut T::DisasContext,
    ir: &mut Context,
) {
    T::init_disas_context(ctx, ir);
    T::tb_start(ctx, ir);

    loop {
        T::insn_start(ctx, ir);
        T::translate_insn(ctx, ir);

        let base = T::base(ctx);
        if base.is_jmp != DisasJumpType::Next {
            break;
        }
        if base.num_insns >= base.max_insns {
            T::base_mut(ctx).is_jmp = DisasJumpType::TooMany;
            break;
        }
    }

    T::tb_stop(ctx, ir);
}

// ---------------------------------------------------------------
// Seams to the execution engine
// ---------------------------------------------------------------

/// Sink for problems found while lowering.
///
/// Neither call aborts translation: the unit is still finished with
/// a terminator.
pub trait CompileDiagnostics: Send + Sync {
    /// A recognized instruction whose operands cannot be lowered
    /// correctly.
    fn compilation_error(&self, addr: u32, msg: &str);

    /// A word the decoder does not recognize.
    fn unknown_instruction(&self, addr: u32, word: u32);
}

/// Diagnostics that only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl CompileDiagnostics for LogDiagnostics {
    fn compilation_error(&self, addr: u32, msg: &str) {
        error!(addr = format_args!("{addr:#010x}"), "compilation error: {msg}");
    }

    fn unknown_instruction(&self, addr: u32, word: u32) {
        warn!(
            addr = format_args!("{addr:#010x}"),
            word = format_args!("{word:#010x}"),
            "unknown instruction"
        );
    }
}

/// Call targets observed at run time, keyed by call site.
pub trait CallSiteProfile: Send + Sync {
    /// Targets seen so far for the computed call at `site`.
    fn known_targets(&self, site: u32) -> Vec<u32>;
}
