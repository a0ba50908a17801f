//! Cooperative interruption.
//!
//! The binaries route SIGINT into an [`Interrupt`] instead of dying on the
//! spot, so that every lock taken so far is released (or every half-built
//! environment removed) on the normal error path. Long-running operations poll
//! the flag at safe points and stop early.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, clonable "stop requested" flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Safe to call from a signal-handling thread.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
