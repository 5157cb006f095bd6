//! Cooperative cancellation for export runs
//!
//! The host UI keeps one clone of the token and the run polls another at
//! defined points (see [`crate::traverse`]). Cancelling never interrupts a
//! host call that is already in flight.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token shared between the caller and a running export.
///
/// # Example
///
/// ```
/// use layerkit_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let run_token = token.clone();
///
/// token.cancel();
/// assert!(run_token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. All clones observe it; calling twice is harmless.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
