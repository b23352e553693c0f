//! Model abstraction and the session's active-model handle.
//!
//! Only one model is resident at a time. Switching presets replaces the
//! whole model; requesting the already-loaded preset reuses it.

use crate::error::Result;
use crate::types::{GeneratedClip, GenerationParams, Melody, ModelPreset};

/// Step callback: `(generated_tokens, total_tokens)`.
///
/// Returning an error aborts generation with that error.
pub type ProgressFn<'a> = dyn FnMut(usize, usize) -> Result<()> + 'a;

/// A loaded text-to-music model.
pub trait MusicModel: Send {
    /// Preset this model was loaded from.
    fn preset(&self) -> ModelPreset;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Output channel count.
    fn audio_channels(&self) -> u16;

    /// Replaces the generation configuration used by later calls.
    fn set_generation_params(&mut self, params: GenerationParams);

    fn generation_params(&self) -> GenerationParams;

    /// Sets only the clip duration, keeping the sampling controls.
    fn configure(&mut self, duration_sec: f32) {
        let mut params = self.generation_params();
        params.duration_sec = duration_sec;
        self.set_generation_params(params);
    }

    /// Generates one clip per prompt. An empty prompt is unconditional.
    fn generate(
        &mut self,
        prompts: &[String],
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<GeneratedClip>>;

    /// Whether [`Self::generate_with_chroma`] can run on this model.
    fn supports_melody(&self) -> bool;

    /// Generates one clip per prompt, each conditioned on the chroma of
    /// the matching melody. Melodies are already at [`Self::sample_rate`].
    fn generate_with_chroma(
        &mut self,
        melodies: &[Melody],
        prompts: &[String],
        progress: &mut ProgressFn<'_>,
    ) -> Result<Vec<GeneratedClip>>;
}

/// Materializes models by preset.
pub trait ModelLoader: Send {
    fn load(&self, preset: ModelPreset) -> Result<Box<dyn MusicModel>>;
}

/// Owns the session's single active model.
pub struct ModelHandle {
    loader: Box<dyn ModelLoader>,
    active: Option<Box<dyn MusicModel>>,
}

impl ModelHandle {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            active: None,
        }
    }

    /// Preset of the resident model, if any.
    pub fn active_preset(&self) -> Option<ModelPreset> {
        self.active.as_ref().map(|model| model.preset())
    }

    /// Resolves `name` to a preset and makes it the active model.
    ///
    /// Unknown names fail before the loader is consulted.
    pub fn load(&mut self, name: &str) -> Result<&mut dyn MusicModel> {
        let preset = ModelPreset::from_name(name)?;
        self.ensure_loaded(preset)
    }

    /// Returns the model for `preset`, loading it first if a different
    /// preset (or none) is resident.
    ///
    /// A failed load leaves the previous model in place.
    pub fn ensure_loaded(&mut self, preset: ModelPreset) -> Result<&mut dyn MusicModel> {
        let model = match self.active.take() {
            Some(model) if model.preset() == preset => model,
            previous => {
                tracing::info!(
                    from = ?previous.as_ref().map(|m| m.preset().as_str()),
                    to = %preset,
                    "loading model"
                );
                match self.loader.load(preset) {
                    Ok(model) => model,
                    Err(e) => {
                        self.active = previous;
                        return Err(e);
                    }
                }
            }
        };

        Ok(self.active.insert(model).as_mut())
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("active", &self.active_preset())
            .finish_non_exhaustive()
    }
}
