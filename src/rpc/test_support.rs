//! Stub model and server state shared by the RPC tests.

use tempfile::TempDir;

use crate::audio::{AudioPostProcessor, SessionStorage};
use crate::config::ToneMapping;
use crate::error::{Result, StudioError};
use crate::generation::{CancellationToken, Orchestrator};
use crate::models::{ModelHandle, ModelLoader, MusicModel, ProgressFn};
use crate::types::{GeneratedClip, GenerationParams, Melody, ModelPreset};

use super::server::ServerState;

#[derive(Debug, Clone, Copy)]
pub enum StubBehavior {
    Succeed,
    Fail,
    /// Requests an interrupt mid-generation.
    Interrupt,
    /// Succeeds on text but has no chroma conditioner.
    TextOnly,
}

struct StubModel {
    preset: ModelPreset,
    params: GenerationParams,
    behavior: StubBehavior,
    cancel: CancellationToken,
}

impl MusicModel for StubModel {
    fn preset(&self) -> ModelPreset {
        self.preset
    }

    fn sample_rate(&self) -> u32 {
        32000
    }

    fn audio_channels(&self) -> u16 {
        1
    }

    fn set_generation_params(&mut self, params: GenerationParams) {
        self.params = params;
    }

    fn generation_params(&self) -> GenerationParams {
        self.params
    }

    fn generate(
        &mut self,
        prompts: &[String],
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<GeneratedClip>> {
        if let StubBehavior::Interrupt = self.behavior {
            self.cancel.cancel();
        }
        progress(2, 4)?;
        progress(4, 4)?;
        if let StubBehavior::Fail = self.behavior {
            return Err(StudioError::model_inference_failed("stub failure"));
        }

        let samples: Vec<f32> = (0..3200)
            .map(|i| 0.25 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 32000.0).sin())
            .collect();
        Ok(prompts
            .iter()
            .map(|_| GeneratedClip::mono(samples.clone(), 32000))
            .collect())
    }

    fn supports_melody(&self) -> bool {
        !matches!(self.behavior, StubBehavior::TextOnly)
    }

    fn generate_with_chroma(
        &mut self,
        _melodies: &[Melody],
        prompts: &[String],
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<GeneratedClip>> {
        self.generate(prompts, progress)
    }
}

struct StubLoader {
    behavior: StubBehavior,
    cancel: CancellationToken,
}

impl ModelLoader for StubLoader {
    fn load(&self, preset: ModelPreset) -> Result<Box<dyn MusicModel>> {
        Ok(Box::new(StubModel {
            preset,
            params: GenerationParams::default(),
            behavior: self.behavior,
            cancel: self.cancel.clone(),
        }))
    }
}

pub fn test_state() -> (ServerState, TempDir) {
    test_state_with(StubBehavior::Succeed)
}

pub fn test_state_with(behavior: StubBehavior) -> (ServerState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let loader = StubLoader {
        behavior,
        cancel: cancel.clone(),
    };
    let orchestrator = Orchestrator::new(
        ModelHandle::new(Box::new(loader)),
        AudioPostProcessor::new(ToneMapping::Legacy),
        SessionStorage::new(dir.path()).unwrap(),
        cancel,
    );
    (ServerState::new(orchestrator), dir)
}
