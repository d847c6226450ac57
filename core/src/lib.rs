pub mod context;
pub mod dump;
pub mod ir_builder;
pub mod label;
pub mod op;
pub mod opcode;
pub mod runtime;
pub mod tb;
pub mod temp;
pub mod types;

pub use context::{Context, Helper};
pub use label::Label;
pub use op::{Op, OpIdx, MAX_OP_ARGS};
pub use opcode::{OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use runtime::{GuestMemory, HelperFn, Runtime, StopReason, MMIO_BASE};
pub use tb::{
    JumpCache, TranslationBlock, EXIT_BLOCK_ENDED, EXIT_HALT, EXIT_RETURN,
    TB_JMP_CACHE_SIZE,
};
pub use temp::{Temp, TempIdx, TempKind};
pub use types::{Cond, MemOp, Type, Vece, TYPE_COUNT};
