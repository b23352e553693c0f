//! Generation request and the parameters derived from it.
//!
//! A [`GenerationRequest`] is what the interface submits. Validation turns
//! it into [`SamplingParams`] that are safe to hand to a model.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

use super::preset::ModelPreset;

/// Default generation length in seconds.
pub const DEFAULT_DURATION_SEC: f32 = 10.0;
/// Longest clip a single request may ask for, in seconds.
pub const MAX_DURATION_SEC: f32 = 120.0;
/// Default number of candidate tokens for top-k sampling.
pub const DEFAULT_TOP_K: f64 = 250.0;
/// Default nucleus threshold (0 disables top-p).
pub const DEFAULT_TOP_P: f32 = 0.0;
/// Default softmax temperature.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
/// Default classifier-free guidance coefficient.
pub const DEFAULT_CFG_COEF: f32 = 3.0;
/// Default treble control value in Hz.
pub const DEFAULT_TREBLE_HZ: f32 = 3000.0;
/// Default bass control value in Hz.
pub const DEFAULT_BASS_HZ: f32 = 300.0;

/// Reference audio used for melody conditioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Interleaved amplitude values.
    pub samples: Vec<f32>,
}

fn default_channels() -> u16 {
    1
}

impl Melody {
    /// Creates a mono melody.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            samples,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// True when there is nothing to condition on.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Wraps this melody as a batch of one.
    pub fn into_batch(self) -> Vec<Melody> {
        vec![self]
    }
}

/// Sampling controls applied during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    /// Candidate tokens considered; 0 disables top-k.
    pub top_k: usize,
    /// Nucleus threshold; 0 disables top-p.
    pub top_p: f32,
    /// Softmax temperature; 0 means greedy decoding.
    pub temperature: f32,
    /// Classifier-free guidance coefficient.
    pub cfg_coef: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K as usize,
            top_p: DEFAULT_TOP_P,
            temperature: DEFAULT_TEMPERATURE,
            cfg_coef: DEFAULT_CFG_COEF,
        }
    }
}

/// Generation configuration held by the active model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Length of each generated clip in seconds.
    pub duration_sec: f32,
    /// Sampling strategy.
    pub sampling: SamplingParams,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            duration_sec: DEFAULT_DURATION_SEC,
            sampling: SamplingParams::default(),
        }
    }
}

/// A single submission from the interface.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Preset identifier, e.g. `facebook/musicgen-small`.
    pub model: String,
    /// Text description; `None` or empty means unconditional.
    pub prompt: Option<String>,
    /// Optional melody reference.
    pub melody: Option<Melody>,
    pub duration_sec: f32,
    /// Any JSON number is accepted; the fractional part is dropped after
    /// validation.
    pub top_k: f64,
    pub top_p: f32,
    pub temperature: f32,
    pub cfg_coef: f32,
    /// High-pass cutoff under the legacy tone mapping.
    pub treble_hz: f32,
    /// Low-pass cutoff under the legacy tone mapping.
    pub bass_hz: f32,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            model: ModelPreset::DEFAULT.as_str().to_string(),
            prompt: None,
            melody: None,
            duration_sec: DEFAULT_DURATION_SEC,
            top_k: DEFAULT_TOP_K,
            top_p: DEFAULT_TOP_P,
            temperature: DEFAULT_TEMPERATURE,
            cfg_coef: DEFAULT_CFG_COEF,
            treble_hz: DEFAULT_TREBLE_HZ,
            bass_hz: DEFAULT_BASS_HZ,
        }
    }
}

impl GenerationRequest {
    /// Creates a text-only request with default controls.
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Checks the numeric controls and returns the generation parameters.
    ///
    /// Order matches the interface: temperature, top-k, top-p, then duration.
    /// NaN fails the `>= 0` comparisons and is rejected. Duration must lie in
    /// `(0, MAX_DURATION_SEC]`.
    pub fn validate(&self) -> Result<GenerationParams> {
        if !(self.temperature >= 0.0) {
            return Err(StudioError::invalid_temperature());
        }
        if !(self.top_k >= 0.0) {
            return Err(StudioError::invalid_top_k());
        }
        if !(self.top_p >= 0.0) {
            return Err(StudioError::invalid_top_p());
        }
        if !(self.duration_sec > 0.0 && self.duration_sec <= MAX_DURATION_SEC) {
            return Err(StudioError::invalid_duration(self.duration_sec));
        }

        Ok(GenerationParams {
            duration_sec: self.duration_sec,
            sampling: SamplingParams {
                top_k: self.top_k as usize,
                top_p: self.top_p,
                temperature: self.temperature,
                cfg_coef: self.cfg_coef,
            },
        })
    }

    /// Prompt text, empty when none was given.
    pub fn prompt_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or("")
    }

    /// The melody, if one with at least one frame was supplied.
    pub fn melody_input(&self) -> Option<&Melody> {
        self.melody.as_ref().filter(|m| !m.is_empty())
    }
}
