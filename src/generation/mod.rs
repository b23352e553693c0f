//! Generation orchestration.
//!
//! [`Orchestrator::predict`] turns one request into a filtered WAV,
//! reporting progress and honouring interrupts along the way.

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{Orchestrator, PredictOutput};
pub use progress::{CancellationToken, Progress, ProgressTracker};
