//! ONNX Runtime implementation of [`MusicModel`].

use std::path::PathBuf;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, StudioError};
use crate::types::{GeneratedClip, GenerationParams, Melody, ModelPreset};

use super::downloader::ensure_models;
use super::handle::{ModelLoader, MusicModel, ProgressFn};
use super::loader::{load_sessions, preset_dir, MusicGenSessions};

/// A MusicGen preset running on ONNX Runtime.
///
/// The exports carry no chroma conditioner, so melody conditioning is
/// rejected with a generation error.
pub struct OnnxMusicGen {
    preset: ModelPreset,
    sessions: MusicGenSessions,
    params: GenerationParams,
    rng: ChaCha8Rng,
}

impl OnnxMusicGen {
    pub fn new(preset: ModelPreset, sessions: MusicGenSessions) -> Self {
        Self {
            preset,
            sessions,
            params: GenerationParams::default(),
            rng: ChaCha8Rng::from_entropy(),
        }
    }
}

impl MusicModel for OnnxMusicGen {
    fn preset(&self) -> ModelPreset {
        self.preset
    }

    fn sample_rate(&self) -> u32 {
        self.sessions.config.sample_rate
    }

    fn audio_channels(&self) -> u16 {
        self.sessions.config.audio_channels
    }

    fn set_generation_params(&mut self, params: GenerationParams) {
        self.params = params;
    }

    fn generation_params(&self) -> GenerationParams {
        self.params
    }

    /// The exported graphs take text conditioning only.
    fn supports_melody(&self) -> bool {
        false
    }

    fn generate(
        &mut self,
        prompts: &[String],
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<GeneratedClip>> {
        let config = self.sessions.config.clone();
        let per_prompt = config.tokens_for_duration(self.params.duration_sec);
        let total = per_prompt * prompts.len();
        let sampling = self.params.sampling;

        let mut clips = Vec::with_capacity(prompts.len());
        for (index, prompt) in prompts.iter().enumerate() {
            let offset = index * per_prompt;
            let encoded = self.sessions.text_encoder.encode(prompt)?;
            tracing::debug!(
                prompt = %prompt,
                tokens = encoded.token_count,
                frames = per_prompt,
                "decoding prompt"
            );

            let frames = self.sessions.decoder.generate_tokens(
                encoded,
                per_prompt,
                &sampling,
                &mut self.rng,
                &mut |generated| progress(offset + generated, total),
            )?;

            let samples = self.sessions.audio_codec.decode(&frames, config.audio_channels)?;
            clips.push(GeneratedClip {
                samples,
                channels: config.audio_channels,
                sample_rate: config.sample_rate,
            });
        }

        Ok(clips)
    }

    fn generate_with_chroma(
        &mut self,
        _melodies: &[Melody],
        _prompts: &[String],
        _progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<GeneratedClip>> {
        Err(StudioError::melody_unsupported(self.preset))
    }
}

/// Loads presets from `<model_root>/<preset dir>`, downloading when possible.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    model_root: PathBuf,
    threads: Option<u32>,
}

impl OnnxLoader {
    pub fn new(model_root: PathBuf, threads: Option<u32>) -> Self {
        Self {
            model_root,
            threads,
        }
    }
}

impl ModelLoader for OnnxLoader {
    fn load(&self, preset: ModelPreset) -> Result<Box<dyn MusicModel>> {
        let dir = preset_dir(&self.model_root, preset);
        ensure_models(&dir, preset)?;
        let sessions = load_sessions(&dir, self.threads)?;
        Ok(Box::new(OnnxMusicGen::new(preset, sessions)))
    }
}
