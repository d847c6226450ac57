//! Guest-side collaborators of the translator: the register file,
//! guest physical memory with its device window, and the reference
//! interpreter.

pub mod cpu;
pub mod interp;
pub mod memory;

pub use cpu::CpuState;
pub use interp::{execute, step, InterpFn, Status};
pub use memory::{GuestRam, LoadError, MmioDevice};
