use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, SpatialError};

/// Cooperative cancellation signal shared between an operator thread and the
/// long-running loops (permutation tests, bandwidth search, per-unit fits).
///
/// Cancellation is checked between iterations; a cancelled run returns
/// `SpatialError::Cancelled` and discards partial results.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that in-flight work stop at the next checkpoint.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Checkpoint helper: `token.bail_if_cancelled()?` between iterations.
    #[inline]
    pub fn bail_if_cancelled(&self) -> Result<()> {
        if self.is_cancelled() { Err(SpatialError::Cancelled) } else { Ok(()) }
    }
}
