//! Run-time record of computed call targets.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use ppujit_frontend::CallSiteProfile;
use tracing::trace;

/// Targets observed per computed call site, in first-seen order.
#[derive(Debug, Default)]
pub struct CallTargets {
    sites: Mutex<HashMap<u32, Vec<u32>>>,
}

impl CallTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `target` for `site`. Returns `true` if it is new.
    pub fn observe(&self, site: u32, target: u32) -> bool {
        let mut sites = self.sites.lock().unwrap_or_else(PoisonError::into_inner);
        let seen = sites.entry(site).or_default();
        if seen.contains(&target) {
            return false;
        }
        seen.push(target);
        trace!(
            site = format_args!("{site:#010x}"),
            target = format_args!("{target:#010x}"),
            "new call target"
        );
        true
    }

    pub fn num_sites(&self) -> usize {
        self.sites
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl CallSiteProfile for CallTargets {
    fn known_targets(&self, site: u32) -> Vec<u32> {
        self.sites
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&site)
            .cloned()
            .unwrap_or_default()
    }
}
