//! Guest disassembler.
//!
//! Renders one instruction word as assembly text. Used by the IR
//! dump annotations and by differential-test mismatch reports.

pub mod ppc;

pub use ppc::{disas_word, print_insn_ppc64};
