//! Audio produced by a model and the files rendered from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Raw waveform returned by a model, one per prompt in the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedClip {
    /// Interleaved samples in [-1, 1] (not yet normalized).
    pub samples: Vec<f32>,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl GeneratedClip {
    /// Creates a mono clip.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: 1,
            sample_rate,
        }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration in seconds.
    pub fn duration_sec(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}

/// Container format of a rendered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
}

impl AudioFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
        }
    }
}

/// A file handed back to the user for playback or download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedFile {
    pub path: PathBuf,
    pub format: AudioFormat,
}

impl RenderedFile {
    /// Creates a WAV rendered file.
    pub fn wav(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: AudioFormat::Wav,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
