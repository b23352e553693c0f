//! Audio post-processing.
//!
//! Turns model output into files: loudness normalization, WAV encoding,
//! treble/bass filtering, melody resampling and session-scoped storage.

pub mod effects;
pub mod filters;
pub mod loudness;
pub mod resample;
pub mod storage;
pub mod wav;

pub use effects::{modified_path, AudioPostProcessor};
pub use loudness::{integrated_loudness, normalize_loudness, LoudnessSettings};
pub use resample::prepare_melody;
pub use storage::{resolve_within, ScratchDir, SessionStorage};
pub use wav::{read_wav, write_wav};
