use ppujit_core::Context;
use tracing::trace;

use crate::optimize::optimize;
use crate::{CodegenBackend, CodegenError, CompiledCode};

/// Full pipeline: optional constant folding, then code generation.
pub fn translate(
    ctx: &mut Context,
    backend: &dyn CodegenBackend,
    opt: bool,
) -> Result<CompiledCode, CodegenError> {
    if opt {
        let before = ctx.num_ops();
        optimize(ctx);
        trace!(ops = before, backend = backend.name(), "optimized");
    }
    backend.generate(ctx)
}
