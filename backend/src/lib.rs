pub mod optimize;
pub mod threaded;
pub mod translate;

use ppujit_core::{Context, Runtime, Type};

pub use threaded::ThreadedCodeGen;
pub use translate::translate;

/// Why the backend rejected an IR program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodegenError {
    #[error("program has no executable ops")]
    Empty,
    #[error("label {0} is referenced but never placed")]
    UnresolvedLabel(u32),
    #[error("control can fall off the end of the program")]
    FallsOffEnd,
    #[error("cannot lower `{op}` on {ty:?}")]
    Unsupported { op: &'static str, ty: Type },
    #[error("invalid condition code {0}")]
    BadCond(u32),
    #[error("call to unregistered helper {0}")]
    UnknownHelper(u32),
}

/// A code generator for IR programs.
///
/// Implementations must be shareable across threads: the
/// translator owns a single instance and drives it from its worker.
pub trait CodegenBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Turn the ops in `ctx` into a callable unit.
    fn generate(&self, ctx: &Context) -> Result<CompiledCode, CodegenError>;
}

/// A generated, callable unit.
pub struct CompiledCode {
    steps: Box<[threaded::Step]>,
    nslots: usize,
}

impl CompiledCode {
    pub(crate) fn new(steps: Box<[threaded::Step]>, nslots: usize) -> Self {
        Self { steps, nslots }
    }

    /// Number of generated steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the unit and return its exit code.
    ///
    /// # Safety
    /// `env` must point at a live register file whose layout matches
    /// the globals of the context the unit was generated from, and
    /// nothing else may access it for the duration of the call.
    pub unsafe fn call(&self, env: *mut u8, rt: &dyn Runtime) -> u32 {
        threaded::execute(&self.steps, self.nslots, env, rt)
    }
}

impl std::fmt::Debug for CompiledCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCode")
            .field("steps", &self.steps.len())
            .field("slots", &self.nslots)
            .finish()
    }
}
