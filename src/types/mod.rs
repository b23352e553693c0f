//! Core data types for musicgen-studio.
//!
//! This module contains the data flowing through a request:
//! - [`GenerationRequest`]: What the interface submits
//! - [`ModelPreset`]: The selectable pretrained checkpoints
//! - [`GeneratedClip`] / [`RenderedFile`]: Model output and the files made from it
//! - [`ModelConfig`]: Architecture parameters of an ONNX export

pub mod clip;
pub mod config;
pub mod preset;
pub mod request;

pub use clip::{AudioFormat, GeneratedClip, RenderedFile};
pub use config::ModelConfig;
pub use preset::ModelPreset;
pub use request::{GenerationParams, GenerationRequest, Melody, SamplingParams};
