//! Progress reporting and cancellation for in-flight generation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared interrupt flag.
///
/// Cloned between the orchestrator and the server; setting it never takes
/// the orchestrator lock. The flag is only observed from the progress
/// callback, so an in-flight model step always finishes first.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the running generation stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears a previous request. Called when a new generation starts.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Progress snapshot sent to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub generated: usize,
    pub total: usize,
}

/// Folds raw model callbacks into a non-decreasing progress value.
///
/// Models may report out of order when several streams are decoded; the
/// displayed value only moves forward and never exceeds the total.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    max_generated: usize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, generated: usize, total: usize) -> Progress {
        self.max_generated = self.max_generated.max(generated);
        Progress {
            generated: self.max_generated.min(total),
            total,
        }
    }
}
