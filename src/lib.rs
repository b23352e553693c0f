//! musicgen-studio: text and melody conditioned music generation.
//!
//! A session loads one MusicGen preset at a time, generates clips from a
//! text prompt (optionally conditioned on a melody), loudness-normalizes
//! them to WAV and applies treble/bass tone filters. Clients drive it over
//! line-delimited JSON-RPC.
//!
//! # Modules
//!
//! - [`types`]: Request, preset, clip and model configuration types
//! - [`config`]: Environment configuration (StudioConfig, ToneMapping)
//! - [`error`]: Error types and codes (StudioError, ErrorCode, ErrorKind)
//! - [`models`]: Model abstraction and the ONNX Runtime backend
//! - [`audio`]: WAV I/O, loudness, resampling, filters and storage
//! - [`generation`]: Request orchestration, progress and cancellation
//! - [`rpc`]: JSON-RPC server
//!
//! # Example
//!
//! ```rust,ignore
//! use musicgen_studio::{
//!     audio::{AudioPostProcessor, SessionStorage},
//!     config::StudioConfig,
//!     generation::{CancellationToken, Orchestrator},
//!     models::{ModelHandle, OnnxLoader},
//!     types::GenerationRequest,
//! };
//!
//! let config = StudioConfig::from_env();
//! let loader = OnnxLoader::new(config.effective_model_path(), config.threads);
//! let mut orchestrator = Orchestrator::new(
//!     ModelHandle::new(Box::new(loader)),
//!     AudioPostProcessor::new(config.tone_mapping),
//!     SessionStorage::new(&config.effective_output_dir())?,
//!     CancellationToken::new(),
//! );
//!
//! let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");
//! let (_video, audio) = orchestrator.predict(&request, &mut |_| {})?;
//! println!("{}", audio.path().display());
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod rpc;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::{StudioConfig, ToneMapping};
pub use error::{ErrorCode, ErrorKind, Result, StudioError};
pub use generation::{CancellationToken, Orchestrator};
pub use types::{GeneratedClip, GenerationRequest, Melody, ModelConfig, ModelPreset, RenderedFile};
