//! Progress reporting and cooperative cancellation for long-running runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Coarse phase of a simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressPhase {
    /// Validation and Cholesky factorization.
    Setup,
    /// Path generation; reported once per batch, never per path.
    Sampling,
    /// Terminal reductions and result assembly.
    Reduction,
}

/// Progress callback: (phase, completed, total).
pub type ProgressCallback = dyn Fn(ProgressPhase, usize, usize) + Send + Sync;

/// Cooperative cancellation token checked at batch boundaries.
///
/// Cancelling never interrupts a batch mid-flight; partially generated
/// batch state is simply discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the run holding this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
