//! Instruction decoding for the 64-bit big-endian PPU guest.
//!
//! `decode` maps a raw instruction word to exactly one [`InsnClass`];
//! operand fields are read lazily through accessors on [`Insn`].
//! [`encode`] builds instruction words, used by branch synthesis and
//! by tests.

pub mod class;
pub mod decoder;
pub mod encode;
pub mod fields;

pub use class::{Form, InsnClass};
pub use decoder::decode;
pub use fields::Insn;
