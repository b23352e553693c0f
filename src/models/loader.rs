//! Model loader for MusicGen ONNX exports.
//!
//! Each preset lives in its own directory under the model root. Loading
//! checks the required files, reads `config.json` when present and opens
//! the four ONNX sessions.

use std::path::{Path, PathBuf};

use ort::session::Session;

use crate::error::{Result, StudioError};
use crate::types::{ModelConfig, ModelPreset};

use super::audio_codec::MusicGenAudioCodec;
use super::decoder::MusicGenDecoder;
use super::text_encoder::MusicGenTextEncoder;

/// Complete set of loaded MusicGen sessions for one preset.
pub struct MusicGenSessions {
    /// Text encoder for converting prompts to embeddings.
    pub text_encoder: MusicGenTextEncoder,
    /// Decoder for autoregressive token generation.
    pub decoder: MusicGenDecoder,
    /// Audio codec for converting tokens to audio samples.
    pub audio_codec: MusicGenAudioCodec,
    /// Architecture of the export.
    pub config: ModelConfig,
}

impl std::fmt::Debug for MusicGenSessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicGenSessions")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Required model files for MusicGen.
pub const REQUIRED_MODEL_FILES: &[&str] = &[
    "tokenizer.json",
    "text_encoder.onnx",
    "decoder_model.onnx",
    "decoder_with_past_model.onnx",
    "encodec_decode.onnx",
];

/// Directory holding a preset's export.
pub fn preset_dir(model_root: &Path, preset: ModelPreset) -> PathBuf {
    model_root.join(preset.dir_name())
}

/// Lists the required files absent from `model_dir`.
pub fn missing_files(model_dir: &Path) -> Vec<&'static str> {
    REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|file| !model_dir.join(file).exists())
        .collect()
}

/// Checks if all required model files exist in the directory.
pub fn check_models(model_dir: &Path) -> Result<()> {
    let missing = missing_files(model_dir);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StudioError::model_not_found(format!(
            "{} (missing: {})",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// Opens an ONNX session, optionally limiting intra-op threads.
pub(crate) fn session_from_file(path: &Path, threads: Option<u32>) -> Result<Session> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut builder = Session::builder()
        .map_err(|e| StudioError::model_load_failed(format!("Failed to create session: {}", e)))?;

    if let Some(threads) = threads {
        builder = builder.with_intra_threads(threads as usize).map_err(|e| {
            StudioError::model_load_failed(format!("Failed to set thread count: {}", e))
        })?;
    }

    builder
        .commit_from_file(path)
        .map_err(|e| StudioError::model_load_failed(format!("Failed to load {}: {}", name, e)))
}

/// Loads all MusicGen sessions from a preset directory.
///
/// The directory must contain the files in [`REQUIRED_MODEL_FILES`] and may
/// contain a `config.json`; musicgen-small's architecture is assumed when it
/// does not.
pub fn load_sessions(model_dir: &Path, threads: Option<u32>) -> Result<MusicGenSessions> {
    check_models(model_dir)?;

    let config = load_config(model_dir)?;
    if let Some(problem) = config.validate() {
        return Err(StudioError::model_load_failed(format!(
            "Invalid config.json in {}: {}",
            model_dir.display(),
            problem
        )));
    }

    tracing::info!(dir = %model_dir.display(), "loading text encoder");
    let text_encoder = MusicGenTextEncoder::load(model_dir, threads)?;

    tracing::info!("loading decoder models");
    let decoder = MusicGenDecoder::load(model_dir, config.clone(), threads)?;

    tracing::info!("loading audio codec");
    let audio_codec = MusicGenAudioCodec::load(model_dir, threads)?;

    tracing::info!(
        layers = config.num_hidden_layers,
        sample_rate = config.sample_rate,
        "all model sessions loaded"
    );

    Ok(MusicGenSessions {
        text_encoder,
        decoder,
        audio_codec,
        config,
    })
}

/// Loads model configuration from config.json or uses defaults.
pub fn load_config(model_dir: &Path) -> Result<ModelConfig> {
    let config_path = model_dir.join("config.json");
    if !config_path.exists() {
        return Ok(ModelConfig::musicgen_small());
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        StudioError::model_load_failed(format!("Failed to read config.json: {}", e))
    })?;
    parse_config(&content)
}

/// Parses the nested HuggingFace MusicGen config.
fn parse_config(content: &str) -> Result<ModelConfig> {
    let json: serde_json::Value = serde_json::from_str(content).map_err(|e| {
        StudioError::model_load_failed(format!("Failed to parse config.json: {}", e))
    })?;

    let decoder = json.get("decoder").ok_or_else(|| {
        StudioError::model_load_failed("config.json missing 'decoder' section")
    })?;
    let text_encoder = json.get("text_encoder");
    let audio_encoder = json.get("audio_encoder");

    let defaults = ModelConfig::musicgen_small();
    let uint = |section: Option<&serde_json::Value>, key: &str| {
        section.and_then(|s| s.get(key)).and_then(|v| v.as_u64())
    };

    Ok(ModelConfig {
        vocab_size: uint(Some(decoder), "vocab_size").map_or(defaults.vocab_size, |v| v as u32),
        num_hidden_layers: uint(Some(decoder), "num_hidden_layers")
            .map_or(defaults.num_hidden_layers, |v| v as u32),
        num_attention_heads: uint(Some(decoder), "num_attention_heads")
            .map_or(defaults.num_attention_heads, |v| v as u32),
        d_model: uint(text_encoder, "d_model").map_or(defaults.d_model, |v| v as u32),
        d_kv: uint(text_encoder, "d_kv").map_or(defaults.d_kv, |v| v as u32),
        audio_channels: uint(Some(decoder), "audio_channels")
            .or_else(|| uint(audio_encoder, "audio_channels"))
            .map_or(defaults.audio_channels, |v| v as u16),
        sample_rate: uint(audio_encoder, "sampling_rate").map_or(defaults.sample_rate, |v| v as u32),
        frame_rate: uint(audio_encoder, "frame_rate").map_or(defaults.frame_rate, |v| v as u32),
        codebooks: uint(Some(decoder), "num_codebooks").map_or(defaults.codebooks, |v| v as u32),
        pad_token_id: decoder
            .get("pad_token_id")
            .and_then(|v| v.as_i64())
            .unwrap_or(defaults.pad_token_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn required_files_list() {
        assert_eq!(REQUIRED_MODEL_FILES.len(), 5);
        assert!(REQUIRED_MODEL_FILES.contains(&"tokenizer.json"));
        assert!(REQUIRED_MODEL_FILES.contains(&"encodec_decode.onnx"));
    }

    #[test]
    fn preset_dirs_are_distinct() {
        let root = Path::new("/models");
        assert_eq!(
            preset_dir(root, ModelPreset::Small),
            PathBuf::from("/models/musicgen-small")
        );
        assert_ne!(
            preset_dir(root, ModelPreset::Melody),
            preset_dir(root, ModelPreset::Large)
        );
    }

    #[test]
    fn check_models_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tokenizer.json"), b"{}").unwrap();

        let err = check_models(dir.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelNotFound);
        assert!(err.message.contains("text_encoder.onnx"));
        assert!(!err.message.contains("tokenizer.json"));
    }

    #[test]
    fn check_models_passes_when_complete() {
        let dir = tempfile::tempdir().unwrap();
        for file in REQUIRED_MODEL_FILES {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        assert!(check_models(dir.path()).is_ok());
        assert!(missing_files(dir.path()).is_empty());
    }

    #[test]
    fn missing_config_uses_small_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), ModelConfig::musicgen_small());
    }

    #[test]
    fn parse_config_reads_nested_sections() {
        let config = parse_config(
            r#"{
                "decoder": {"num_hidden_layers": 48, "num_attention_heads": 24,
                            "vocab_size": 2048, "pad_token_id": 2048,
                            "num_codebooks": 8, "audio_channels": 2},
                "text_encoder": {"d_model": 1024, "d_kv": 64},
                "audio_encoder": {"sampling_rate": 32000, "frame_rate": 50}
            }"#,
        )
        .unwrap();
        assert_eq!(config.num_hidden_layers, 48);
        assert_eq!(config.num_attention_heads, 24);
        assert_eq!(config.d_model, 1024);
        assert_eq!(config.codebooks, 8);
        assert_eq!(config.audio_channels, 2);
        assert_eq!(config.frame_rate, 50);
    }

    #[test]
    fn parse_config_requires_decoder_section() {
        let err = parse_config(r#"{"text_encoder": {}}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelLoadFailed);
    }
}
