//! MusicGen models.
//!
//! [`handle`] defines the model abstraction the orchestrator works against.
//! The rest wraps the ONNX exports:
//! - [`TextEncoder`](text_encoder::MusicGenTextEncoder): Text prompt encoding
//! - [`Decoder`](decoder::MusicGenDecoder): Autoregressive token generation
//! - [`AudioCodec`](audio_codec::MusicGenAudioCodec): Token to audio decoding
//! - [`DelayPatternMaskIds`](delay_pattern::DelayPatternMaskIds): Codebook delay pattern
//! - [`Logits`](logits::Logits): Guidance and sampling

pub mod audio_codec;
pub mod decoder;
pub mod delay_pattern;
pub mod downloader;
pub mod handle;
pub mod loader;
pub mod logits;
pub mod onnx;
pub mod text_encoder;

pub use handle::{ModelHandle, ModelLoader, MusicModel, ProgressFn};
pub use loader::{check_models, load_sessions, MusicGenSessions, REQUIRED_MODEL_FILES};
pub use onnx::{OnnxLoader, OnnxMusicGen};
