//! Per-tab single-flight marker for the external redirect
//!
//! A browser tab never needs this: leaving for the provider stops all
//! script execution. A long-lived host keeps running, so a second guarded
//! navigation while the first redirect is outstanding must not mint another
//! state/verifier pair. The marker is set when a redirect is issued and
//! cleared by the next callback, whatever its outcome.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct RedirectFlight {
    outstanding: AtomicBool,
}

impl RedirectFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flight. `false` when a redirect is already outstanding.
    pub fn try_start(&self) -> bool {
        self.outstanding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn finish(&self) {
        self.outstanding.store(false, Ordering::Release);
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }
}
