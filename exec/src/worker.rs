//! Background compiler thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ppujit_core::Context;
use tracing::{debug, error, trace};

use crate::translator::Shared;

/// Spawn the worker that drains the pending queue of `shared`.
pub(crate) fn spawn(shared: Arc<Shared>) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("ppujit-compiler".into())
        .spawn(move || run(&shared))
}

fn run(shared: &Shared) {
    let mut ir = Context::new();
    let poll = shared.config.worker_poll_interval;
    debug!("compiler worker started");

    while let Some(batch) = shared.cache.wait_for_work(poll) {
        debug!(queued = batch.len(), "compiler worker woke");
        for addr in batch {
            if shared.cache.is_shut_down() {
                break;
            }
            compile_one(shared, &mut ir, addr);
        }
    }
    debug!("compiler worker stopped");
}

/// Compile and publish `addr`, or mark it as permanently
/// interpreted.
pub(crate) fn compile_one(shared: &Shared, ir: &mut Context, addr: u32) {
    match shared.compile(ir, addr) {
        Ok(entry) => {
            let callees = if shared.config.prefetch_callees {
                entry.callees.clone()
            } else {
                Vec::new()
            };
            let (rev, insns) = (entry.revision, entry.instruction_count);
            if shared.cache.publish(entry) {
                trace!(
                    addr = format_args!("{addr:#010x}"),
                    revision = rev,
                    insns,
                    "published"
                );
            }
            for c in callees {
                shared.cache.request(c);
            }
        }
        Err(e) => {
            if shared.cache.fail(addr) {
                error!(addr = format_args!("{addr:#010x}"), "compilation failed: {e}");
            }
        }
    }
}
