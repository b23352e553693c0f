//! Error types for musicgen-studio.
//!
//! Every failure that reaches the presentation layer is a [`StudioError`]
//! carrying an [`ErrorCode`]. Codes group into four kinds: validation,
//! model load, generation and interruption.

use std::fmt;

use crate::types::request::MAX_DURATION_SEC;
use crate::types::ModelPreset;

/// Broad error category surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad user-supplied parameter. Raised before any model work.
    Validation,
    /// Requested preset unknown or its weights could not be materialized.
    ModelLoad,
    /// Inference or rendering failed. No partial output is returned.
    Generation,
    /// The user cancelled the in-flight request.
    Interrupted,
}

impl ErrorKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ModelLoad => "model_load",
            ErrorKind::Generation => "generation",
            ErrorKind::Interrupted => "interrupted",
        }
    }
}

/// Error codes returned to clients.
///
/// These codes are used in JSON-RPC error responses and allow clients
/// to programmatically handle specific error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Temperature below zero (or not a number).
    InvalidTemperature,

    /// Top-k below zero.
    InvalidTopK,

    /// Top-p below zero (or not a number).
    InvalidTopP,

    /// Duration not in `(0, MAX_DURATION_SEC]` seconds.
    InvalidDuration,

    /// Model name is not one of the known presets.
    UnknownModel,

    /// ONNX model files not found at expected path.
    /// Trigger: files missing and no download source for the preset.
    ModelNotFound,

    /// Failed to load ONNX model into memory.
    /// Trigger: Corrupt file, wrong format, or OOM during load.
    ModelLoadFailed,

    /// Failed to download model from remote source.
    /// Trigger: Network error, disk full during download.
    ModelDownloadFailed,

    /// Model inference failed during generation.
    /// Trigger: Numerical instability, OOM, unsupported conditioning.
    ModelInferenceFailed,

    /// A melody was supplied to a model without a chroma conditioner.
    MelodyUnsupported,

    /// Reading or writing an audio file failed.
    AudioIoFailed,

    /// Generation was cancelled through the interrupt flag.
    Interrupted,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidTemperature => "INVALID_TEMPERATURE",
            ErrorCode::InvalidTopK => "INVALID_TOP_K",
            ErrorCode::InvalidTopP => "INVALID_TOP_P",
            ErrorCode::InvalidDuration => "INVALID_DURATION",
            ErrorCode::UnknownModel => "UNKNOWN_MODEL",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::ModelInferenceFailed => "MODEL_INFERENCE_FAILED",
            ErrorCode::MelodyUnsupported => "MELODY_UNSUPPORTED",
            ErrorCode::AudioIoFailed => "AUDIO_IO_FAILED",
            ErrorCode::Interrupted => "INTERRUPTED",
        }
    }

    /// Returns the kind this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::InvalidTemperature
            | ErrorCode::InvalidTopK
            | ErrorCode::InvalidTopP
            | ErrorCode::InvalidDuration => ErrorKind::Validation,
            ErrorCode::UnknownModel
            | ErrorCode::ModelNotFound
            | ErrorCode::ModelLoadFailed
            | ErrorCode::ModelDownloadFailed => ErrorKind::ModelLoad,
            ErrorCode::ModelInferenceFailed
            | ErrorCode::MelodyUnsupported
            | ErrorCode::AudioIoFailed => ErrorKind::Generation,
            ErrorCode::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidTemperature => "Use a temperature of 0 or more (1.0 is the default)",
            ErrorCode::InvalidTopK => "Use a top-k of 0 or more (250 is the default)",
            ErrorCode::InvalidTopP => "Use a top-p of 0 or more (0 disables nucleus sampling)",
            ErrorCode::InvalidDuration => "Pick a duration between 1 and 120 seconds",
            ErrorCode::UnknownModel => {
                "Choose one of facebook/musicgen-melody, facebook/musicgen-medium, \
                 facebook/musicgen-small or facebook/musicgen-large"
            }
            ErrorCode::ModelNotFound => {
                "Place the preset's ONNX export (tokenizer.json, text_encoder.onnx, \
                 decoder_model.onnx, decoder_with_past_model.onnx, encodec_decode.onnx) \
                 in the directory named in the message, or set MUSICGEN_MODEL_PATH"
            }
            ErrorCode::ModelLoadFailed => {
                "Check available memory, verify model files are not corrupted, \
                 or delete the preset directory and re-download"
            }
            ErrorCode::ModelDownloadFailed => {
                "Check internet connection and disk space, \
                 or try again later if HuggingFace is unavailable"
            }
            ErrorCode::ModelInferenceFailed => {
                "Try a shorter duration or another preset"
            }
            ErrorCode::MelodyUnsupported => {
                "Clear the melody input, or load an export of facebook/musicgen-melody \
                 that includes the chroma conditioner"
            }
            ErrorCode::AudioIoFailed => "Check free space and permissions of the output directory",
            ErrorCode::Interrupted => "Submit the request again to restart generation",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for studio operations.
#[derive(Debug)]
pub struct StudioError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StudioError {
    /// Creates a new StudioError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new StudioError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    /// Creates an INVALID_TEMPERATURE error.
    pub fn invalid_temperature() -> Self {
        Self::new(ErrorCode::InvalidTemperature, "Temperature must be >= 0.")
    }

    /// Creates an INVALID_TOP_K error.
    pub fn invalid_top_k() -> Self {
        Self::new(ErrorCode::InvalidTopK, "Topk must be non-negative.")
    }

    /// Creates an INVALID_TOP_P error.
    pub fn invalid_top_p() -> Self {
        Self::new(ErrorCode::InvalidTopP, "Topp must be non-negative.")
    }

    /// Creates an INVALID_DURATION error.
    pub fn invalid_duration(duration: f32) -> Self {
        Self::new(
            ErrorCode::InvalidDuration,
            format!(
                "Invalid duration: {} seconds (must be positive and at most {})",
                duration, MAX_DURATION_SEC
            ),
        )
    }

    /// Creates an UNKNOWN_MODEL error.
    pub fn unknown_model(name: &str) -> Self {
        Self::new(ErrorCode::UnknownModel, format!("Unknown model: {}", name))
    }

    /// Creates a MODEL_NOT_FOUND error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelNotFound,
            format!("Model files not found at: {}", path.into()),
        )
    }

    /// Creates a MODEL_LOAD_FAILED error.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelLoadFailed,
            format!("Failed to load model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_DOWNLOAD_FAILED error.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelDownloadFailed,
            format!("Failed to download model: {}", reason.into()),
        )
    }

    /// Creates a MODEL_INFERENCE_FAILED error.
    pub fn model_inference_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelInferenceFailed,
            format!("Inference failed: {}", reason.into()),
        )
    }

    /// Creates a MELODY_UNSUPPORTED error.
    pub fn melody_unsupported(preset: ModelPreset) -> Self {
        let reason = if preset.supports_melody() {
            "this export has no chroma conditioner"
        } else {
            "the checkpoint was trained on text only"
        };
        Self::new(
            ErrorCode::MelodyUnsupported,
            format!("{} cannot be conditioned on a melody: {}", preset, reason),
        )
    }

    /// Creates an AUDIO_IO_FAILED error.
    pub fn audio_io(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::AudioIoFailed, reason)
    }

    /// Creates an INTERRUPTED error.
    pub fn interrupted() -> Self {
        Self::new(ErrorCode::Interrupted, "Interrupted.")
    }
}

impl fmt::Display for StudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for StudioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using StudioError.
pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [ErrorCode; 12] = [
        ErrorCode::InvalidTemperature,
        ErrorCode::InvalidTopK,
        ErrorCode::InvalidTopP,
        ErrorCode::InvalidDuration,
        ErrorCode::UnknownModel,
        ErrorCode::ModelNotFound,
        ErrorCode::ModelLoadFailed,
        ErrorCode::ModelDownloadFailed,
        ErrorCode::ModelInferenceFailed,
        ErrorCode::MelodyUnsupported,
        ErrorCode::AudioIoFailed,
        ErrorCode::Interrupted,
    ];

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::InvalidTemperature.as_str(), "INVALID_TEMPERATURE");
        assert_eq!(ErrorCode::InvalidTopK.as_str(), "INVALID_TOP_K");
        assert_eq!(ErrorCode::InvalidTopP.as_str(), "INVALID_TOP_P");
        assert_eq!(ErrorCode::ModelLoadFailed.as_str(), "MODEL_LOAD_FAILED");
        assert_eq!(ErrorCode::Interrupted.as_str(), "INTERRUPTED");
    }

    #[test]
    fn error_code_recovery_hints_not_empty() {
        for code in ALL_CODES {
            assert!(!code.recovery_hint().is_empty(), "{} has no hint", code);
        }
    }

    #[test]
    fn validation_codes_are_distinct() {
        let codes = [
            StudioError::invalid_temperature().code,
            StudioError::invalid_top_k().code,
            StudioError::invalid_top_p().code,
        ];
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
        assert!(codes.iter().all(|c| c.kind() == ErrorKind::Validation));
    }

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(ErrorCode::UnknownModel.kind(), ErrorKind::ModelLoad);
        assert_eq!(ErrorCode::ModelDownloadFailed.kind(), ErrorKind::ModelLoad);
        assert_eq!(ErrorCode::AudioIoFailed.kind(), ErrorKind::Generation);
        assert_eq!(ErrorCode::MelodyUnsupported.kind(), ErrorKind::Generation);
        assert_eq!(ErrorCode::Interrupted.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn melody_unsupported_names_the_reason() {
        let err = StudioError::melody_unsupported(ModelPreset::Melody);
        assert!(err.message.contains("no chroma conditioner"));
        let err = StudioError::melody_unsupported(ModelPreset::Small);
        assert!(err.message.contains("text only"));
        assert!(err.message.starts_with("facebook/musicgen-small"));
    }

    #[test]
    fn studio_error_display() {
        let err = StudioError::invalid_temperature();
        let text = err.to_string();
        assert!(text.contains("INVALID_TEMPERATURE"));
        assert!(text.contains("Temperature must be >= 0."));
        assert!(text.contains("Recovery:"));
    }
}
