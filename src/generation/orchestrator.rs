//! Request orchestration: validation, model selection, generation and
//! post-processing of a single prediction.

use crate::audio::{prepare_melody, AudioPostProcessor, SessionStorage};
use crate::error::{Result, StudioError};
use crate::models::ModelHandle;
use crate::types::{GenerationRequest, ModelPreset, RenderedFile};

use super::progress::{CancellationToken, Progress, ProgressTracker};

/// Files returned to the interface: the video slot and the audio slot.
///
/// Both refer to the same filtered WAV.
pub type PredictOutput = (RenderedFile, RenderedFile);

/// Runs predictions against the session's active model.
pub struct Orchestrator {
    models: ModelHandle,
    post: AudioPostProcessor,
    storage: SessionStorage,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        models: ModelHandle,
        post: AudioPostProcessor,
        storage: SessionStorage,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            models,
            post,
            storage,
            cancel,
        }
    }

    /// Token that interrupts the running prediction.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn active_preset(&self) -> Option<ModelPreset> {
        self.models.active_preset()
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Generates music for `request` and returns the filtered file.
    ///
    /// Parameters are validated before any model work, and a melody is
    /// refused before resampling when the model cannot use it. `observer` receives
    /// every progress update; after each one the cancellation token is
    /// checked and a set token aborts with INTERRUPTED. Nothing is left on
    /// disk when the prediction fails.
    pub fn predict(
        &mut self,
        request: &GenerationRequest,
        observer: &mut dyn FnMut(Progress),
    ) -> Result<PredictOutput> {
        let params = request.validate()?;
        self.cancel.reset();

        let model = self.models.load(&request.model)?;
        let preset = model.preset();
        if request.melody_input().is_some() && !model.supports_melody() {
            return Err(StudioError::melody_unsupported(preset));
        }
        model.set_generation_params(params);

        let cancel = self.cancel.clone();
        let mut tracker = ProgressTracker::new();
        let mut on_progress = |generated: usize, total: usize| -> Result<()> {
            observer(tracker.update(generated, total));
            if cancel.is_cancelled() {
                return Err(StudioError::interrupted());
            }
            Ok(())
        };

        let prompts = vec![request.prompt_text().to_string()];
        tracing::info!(
            model = %preset,
            prompt = %prompts[0],
            duration_sec = params.duration_sec,
            melody = request.melody_input().is_some(),
            "starting generation"
        );

        let clips = match request.melody_input() {
            Some(melody) => {
                let prepared = prepare_melody(melody, model.sample_rate(), model.audio_channels())?;
                model.generate_with_chroma(&prepared.into_batch(), &prompts, &mut on_progress)?
            }
            None => model.generate(&prompts, &mut on_progress)?,
        };

        if clips.is_empty() {
            return Err(StudioError::model_inference_failed("Model returned no audio"));
        }

        let scratch = self.storage.scratch()?;
        let mut outputs = Vec::with_capacity(clips.len());
        for clip in &clips {
            let path = self
                .post
                .process_clip(clip, scratch.path(), request.treble_hz, request.bass_hz)?;
            outputs.push(path);
        }
        scratch.commit();

        let path = outputs.swap_remove(0);
        tracing::info!(path = %path.display(), "generation complete");
        Ok((RenderedFile::wav(path.clone()), RenderedFile::wav(path)))
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("models", &self.models)
            .field("tone_mapping", &self.post.tone_mapping())
            .field("storage", &self.storage.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ErrorKind};
    use crate::models::{ModelLoader, MusicModel, ProgressFn};
    use crate::types::{GeneratedClip, GenerationParams, Melody};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(ModelPreset),
        SetParams(GenerationParams),
        Generate(Vec<String>),
        GenerateWithChroma { melodies: Vec<Melody>, prompts: Vec<String> },
    }

    #[derive(Clone)]
    struct Behavior {
        ticks: Vec<(usize, usize)>,
        clips: usize,
        fail: bool,
        melody: bool,
    }

    impl Default for Behavior {
        fn default() -> Self {
            Self {
                ticks: vec![(5, 10), (10, 10)],
                clips: 1,
                fail: false,
                melody: true,
            }
        }
    }

    struct SpyModel {
        preset: ModelPreset,
        params: GenerationParams,
        behavior: Behavior,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl SpyModel {
        fn run(&self, progress: &mut ProgressFn<'_>) -> crate::error::Result<Vec<GeneratedClip>> {
            for &(generated, total) in &self.behavior.ticks {
                progress(generated, total)?;
            }
            if self.behavior.fail {
                return Err(StudioError::model_inference_failed("spy failure"));
            }
            let samples: Vec<f32> = (0..32000)
                .map(|i| 0.3 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 32000.0).sin())
                .collect();
            Ok((0..self.behavior.clips)
                .map(|_| GeneratedClip::mono(samples.clone(), 32000))
                .collect())
        }
    }

    impl MusicModel for SpyModel {
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
            self.calls.lock().unwrap().push(Call::SetParams(params));
            self.params = params;
        }

        fn generation_params(&self) -> GenerationParams {
            self.params
        }

        fn supports_melody(&self) -> bool {
            self.behavior.melody
        }

        fn generate(
            &mut self,
            prompts: &[String],
            progress: &mut ProgressFn<'_>,
        ) -> crate::error::Result<Vec<GeneratedClip>> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Generate(prompts.to_vec()));
            self.run(progress)
        }

        fn generate_with_chroma(
            &mut self,
            melodies: &[Melody],
            prompts: &[String],
            progress: &mut ProgressFn<'_>,
        ) -> crate::error::Result<Vec<GeneratedClip>> {
            self.calls.lock().unwrap().push(Call::GenerateWithChroma {
                melodies: melodies.to_vec(),
                prompts: prompts.to_vec(),
            });
            self.run(progress)
        }
    }

    struct SpyLoader {
        behavior: Behavior,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl ModelLoader for SpyLoader {
        fn load(&self, preset: ModelPreset) -> crate::error::Result<Box<dyn MusicModel>> {
            self.calls.lock().unwrap().push(Call::Load(preset));
            Ok(Box::new(SpyModel {
                preset,
                params: GenerationParams::default(),
                behavior: self.behavior.clone(),
                calls: self.calls.clone(),
            }))
        }
    }

    struct Fixture {
        orchestrator: Orchestrator,
        calls: Arc<Mutex<Vec<Call>>>,
        _parent: tempfile::TempDir,
    }

    impl Fixture {
        fn new(behavior: Behavior) -> Self {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let parent = tempfile::tempdir().unwrap();
            let loader = SpyLoader {
                behavior,
                calls: calls.clone(),
            };
            let orchestrator = Orchestrator::new(
                ModelHandle::new(Box::new(loader)),
                AudioPostProcessor::default(),
                SessionStorage::new(parent.path()).unwrap(),
                CancellationToken::new(),
            );
            Self {
                orchestrator,
                calls,
                _parent: parent,
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn stored_entries(&self) -> usize {
            std::fs::read_dir(self.orchestrator.storage().path())
                .unwrap()
                .count()
        }
    }

    fn ignore(_: Progress) {}

    #[test]
    fn calm_piano_produces_one_filtered_pair() {
        let mut fx = Fixture::new(Behavior::default());
        let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");

        let (video, audio) = fx.orchestrator.predict(&request, &mut ignore).unwrap();

        assert_eq!(video, audio);
        assert!(audio.path().exists());
        assert!(audio
            .path()
            .to_string_lossy()
            .ends_with("_modified.wav"));
        assert!(audio.path().starts_with(fx.orchestrator.storage().path()));

        let calls = fx.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Load(ModelPreset::Small));
        match &calls[1] {
            Call::SetParams(params) => assert_eq!(params.duration_sec, 10.0),
            other => panic!("expected params before generation, got {:?}", other),
        }
        assert_eq!(calls[2], Call::Generate(vec!["calm piano".to_string()]));
    }

    #[test]
    fn sampling_controls_reach_the_model() {
        let mut fx = Fixture::new(Behavior::default());
        let mut request = GenerationRequest::text("facebook/musicgen-small", "lofi");
        request.duration_sec = 5.0;
        request.top_k = 50.0;
        request.top_p = 0.9;
        request.temperature = 0.7;
        request.cfg_coef = 4.5;

        fx.orchestrator.predict(&request, &mut ignore).unwrap();

        let expected = GenerationParams {
            duration_sec: 5.0,
            sampling: crate::types::SamplingParams {
                top_k: 50,
                top_p: 0.9,
                temperature: 0.7,
                cfg_coef: 4.5,
            },
        };
        assert!(fx.calls().contains(&Call::SetParams(expected)));
    }

    #[test]
    fn negative_temperature_rejected_before_model_work() {
        let mut fx = Fixture::new(Behavior::default());
        let mut request = GenerationRequest::text("facebook/musicgen-small", "calm piano");
        request.temperature = -1.0;

        let err = fx.orchestrator.predict(&request, &mut ignore).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTemperature);
        assert_eq!(err.message, "Temperature must be >= 0.");
        assert!(fx.calls().is_empty());
        assert_eq!(fx.stored_entries(), 0);
    }

    #[test]
    fn each_negative_control_has_its_own_code() {
        let mut fx = Fixture::new(Behavior::default());

        let mut request = GenerationRequest::default();
        request.top_k = -1.0;
        let err = fx.orchestrator.predict(&request, &mut ignore).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTopK);

        let mut request = GenerationRequest::default();
        request.top_p = -0.5;
        let err = fx.orchestrator.predict(&request, &mut ignore).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTopP);

        assert!(fx.calls().is_empty());
    }

    #[test]
    fn unknown_model_fails_before_loading() {
        let mut fx = Fixture::new(Behavior::default());
        let request = GenerationRequest::text("facebook/musicgen-huge", "calm piano");

        let err = fx.orchestrator.predict(&request, &mut ignore).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
        assert!(fx.calls().is_empty());
    }

    #[test]
    fn melody_uses_chroma_with_single_item_batch() {
        let mut fx = Fixture::new(Behavior::default());
        let mut request = GenerationRequest::text("facebook/musicgen-melody", "jazz");
        request.melody = Some(Melody {
            sample_rate: 32000,
            channels: 2,
            samples: vec![0.5, 0.1, 0.5, 0.1, -0.5, -0.1],
        });

        fx.orchestrator.predict(&request, &mut ignore).unwrap();

        let calls = fx.calls();
        let chroma = calls
            .iter()
            .find_map(|c| match c {
                Call::GenerateWithChroma { melodies, prompts } => Some((melodies, prompts)),
                _ => None,
            })
            .expect("generate_with_chroma was not called");
        assert_eq!(chroma.0.len(), 1);
        assert_eq!(chroma.0[0].channels, 1);
        assert_eq!(chroma.0[0].sample_rate, 32000);
        assert_eq!(chroma.0[0].samples.len(), 3);
        assert_eq!(chroma.1, &vec!["jazz".to_string()]);
        assert!(!calls.iter().any(|c| matches!(c, Call::Generate(_))));
    }

    #[test]
    fn melody_refused_by_text_only_model() {
        let mut fx = Fixture::new(Behavior {
            melody: false,
            ..Behavior::default()
        });
        let mut request = GenerationRequest::text("facebook/musicgen-melody", "jazz");
        request.melody = Some(Melody::mono(vec![0.1; 44100 * 30], 44100));

        let mut seen = Vec::new();
        let err = fx
            .orchestrator
            .predict(&request, &mut |p: Progress| seen.push(p))
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::MelodyUnsupported);
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert_eq!(fx.calls(), vec![Call::Load(ModelPreset::Melody)]);
        assert!(seen.is_empty());
        assert_eq!(fx.stored_entries(), 0);
    }

    #[test]
    fn melody_is_resampled_to_model_rate() {
        let mut fx = Fixture::new(Behavior::default());
        let mut request = GenerationRequest::text("facebook/musicgen-melody", "");
        request.melody = Some(Melody::mono(vec![0.1; 44100], 44100));

        fx.orchestrator.predict(&request, &mut ignore).unwrap();

        let melody = fx
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::GenerateWithChroma { melodies, .. } => melodies.into_iter().next(),
                _ => None,
            })
            .unwrap();
        assert_eq!(melody.sample_rate, 32000);
        assert_eq!(melody.samples.len(), 32000);
    }

    #[test]
    fn empty_melody_falls_back_to_text() {
        let mut fx = Fixture::new(Behavior::default());
        let mut request = GenerationRequest::text("facebook/musicgen-small", "ambient");
        request.melody = Some(Melody::mono(vec![], 32000));

        fx.orchestrator.predict(&request, &mut ignore).unwrap();
        assert!(fx
            .calls()
            .contains(&Call::Generate(vec!["ambient".to_string()])));
    }

    #[test]
    fn missing_prompt_is_unconditional() {
        let mut fx = Fixture::new(Behavior::default());
        let request = GenerationRequest {
            model: "facebook/musicgen-small".to_string(),
            ..GenerationRequest::default()
        };

        fx.orchestrator.predict(&request, &mut ignore).unwrap();
        assert!(fx.calls().contains(&Call::Generate(vec![String::new()])));
    }

    #[test]
    fn interrupt_at_three_of_ten_renders_nothing() {
        let mut fx = Fixture::new(Behavior {
            ticks: (1..=10).map(|i| (i, 10)).collect(),
            ..Behavior::default()
        });
        let token = fx.orchestrator.cancellation_token();
        let mut seen = Vec::new();
        let mut observer = |p: Progress| {
            seen.push(p);
            if p.generated == 3 {
                token.cancel();
            }
        };

        let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");
        let err = fx.orchestrator.predict(&request, &mut observer).unwrap_err();

        assert_eq!(err.code, ErrorCode::Interrupted);
        assert_eq!(err.kind(), ErrorKind::Interrupted);
        assert_eq!(seen.last(), Some(&Progress { generated: 3, total: 10 }));
        assert_eq!(seen.len(), 3);
        assert_eq!(fx.stored_entries(), 0);
    }

    #[test]
    fn stale_interrupt_is_cleared_by_next_request() {
        let mut fx = Fixture::new(Behavior::default());
        fx.orchestrator.cancellation_token().cancel();

        let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");
        assert!(fx.orchestrator.predict(&request, &mut ignore).is_ok());
    }

    #[test]
    fn progress_reported_monotonically() {
        let mut fx = Fixture::new(Behavior {
            ticks: vec![(4, 10), (2, 10), (12, 10)],
            ..Behavior::default()
        });
        let mut seen = Vec::new();
        let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");
        fx.orchestrator
            .predict(&request, &mut |p: Progress| seen.push(p.generated))
            .unwrap();
        assert_eq!(seen, vec![4, 4, 10]);
    }

    #[test]
    fn model_failure_leaves_no_files() {
        let mut fx = Fixture::new(Behavior {
            fail: true,
            ..Behavior::default()
        });
        let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");

        let err = fx.orchestrator.predict(&request, &mut ignore).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert_eq!(fx.stored_entries(), 0);
    }

    #[test]
    fn zero_clips_is_a_generation_error() {
        let mut fx = Fixture::new(Behavior {
            clips: 0,
            ..Behavior::default()
        });
        let request = GenerationRequest::text("facebook/musicgen-small", "calm piano");

        let err = fx.orchestrator.predict(&request, &mut ignore).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelInferenceFailed);
    }

    #[test]
    fn preset_reused_and_switched() {
        let mut fx = Fixture::new(Behavior::default());
        let small = GenerationRequest::text("facebook/musicgen-small", "a");
        let large = GenerationRequest::text("facebook/musicgen-large", "b");

        fx.orchestrator.predict(&small, &mut ignore).unwrap();
        fx.orchestrator.predict(&small, &mut ignore).unwrap();
        fx.orchestrator.predict(&large, &mut ignore).unwrap();

        let loads: Vec<_> = fx
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Load(_)))
            .collect();
        assert_eq!(
            loads,
            vec![Call::Load(ModelPreset::Small), Call::Load(ModelPreset::Large)]
        );
        assert_eq!(fx.orchestrator.active_preset(), Some(ModelPreset::Large));
    }
}
