//! Studio configuration module.
//!
//! Contains the runtime configuration for musicgen-studio: where model
//! exports and rendered files live, the server port, ONNX threading, and
//! how the treble/bass controls map onto the tone filters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default TCP port of the RPC server.
pub const DEFAULT_PORT: u16 = 7860;

/// How the treble and bass controls map onto the two tone filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToneMapping {
    /// Treble sets the high-pass cutoff, bass sets the low-pass cutoff.
    ///
    /// This is the historical behaviour. With the default controls
    /// (treble 3000 Hz, bass 300 Hz) it removes most of the signal.
    #[default]
    Legacy,

    /// Treble sets the low-pass cutoff, bass sets the high-pass cutoff.
    Conventional,
}

impl ToneMapping {
    /// Returns the string representation of the mapping.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToneMapping::Legacy => "legacy",
            ToneMapping::Conventional => "conventional",
        }
    }

    /// Parses a mapping from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Some(ToneMapping::Legacy),
            "conventional" => Some(ToneMapping::Conventional),
            _ => None,
        }
    }

    /// Returns `(high_pass_hz, low_pass_hz)` for the given control values.
    pub fn cutoffs(&self, treble_hz: f32, bass_hz: f32) -> (f32, f32) {
        match self {
            ToneMapping::Legacy => (treble_hz, bass_hz),
            ToneMapping::Conventional => (bass_hz, treble_hz),
        }
    }
}

impl std::fmt::Display for ToneMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration for the studio.
///
/// Loaded from environment variables at startup; the only command-line
/// flag is `--share`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioConfig {
    /// Root directory holding one ONNX export directory per preset.
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Parent directory of the session's temporary storage.
    /// If None, uses the system temporary directory.
    pub output_dir: Option<PathBuf>,

    /// TCP port of the RPC server.
    pub port: u16,

    /// Number of threads for intra-op parallelism in ONNX Runtime.
    /// If None, uses ONNX Runtime's default.
    pub threads: Option<u32>,

    /// Treble/bass to filter mapping.
    pub tone_mapping: ToneMapping,
}

impl StudioConfig {
    /// Creates a new StudioConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a StudioConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `MUSICGEN_MODEL_PATH` - Root directory of preset exports
    /// - `MUSICGEN_OUTPUT_DIR` - Parent of the session temp directory
    /// - `MUSICGEN_PORT` - RPC server port
    /// - `MUSICGEN_THREADS` - ONNX Runtime intra-op threads
    /// - `MUSICGEN_TONE_MAPPING` - `legacy` or `conventional`
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MUSICGEN_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("MUSICGEN_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(path));
        }

        if let Some(port_str) = lookup("MUSICGEN_PORT") {
            match port_str.trim().parse::<u16>() {
                Ok(port) if port > 0 => config.port = port,
                _ => tracing::warn!(value = %port_str, "ignoring invalid MUSICGEN_PORT"),
            }
        }

        if let Some(threads_str) = lookup("MUSICGEN_THREADS") {
            match threads_str.trim().parse::<u32>() {
                Ok(threads) if (1..=256).contains(&threads) => config.threads = Some(threads),
                _ => tracing::warn!(value = %threads_str, "ignoring invalid MUSICGEN_THREADS"),
            }
        }

        if let Some(mapping_str) = lookup("MUSICGEN_TONE_MAPPING") {
            match ToneMapping::parse(&mapping_str) {
                Some(mapping) => config.tone_mapping = mapping,
                None => tracing::warn!(value = %mapping_str, "ignoring invalid MUSICGEN_TONE_MAPPING"),
            }
        }

        config
    }

    /// Returns the effective model root, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        if let Some(ref path) = self.model_path {
            path.clone()
        } else {
            default_model_path()
        }
    }

    /// Returns the directory under which the session temp dir is created.
    pub fn effective_output_dir(&self) -> PathBuf {
        if let Some(ref path) = self.output_dir {
            path.clone()
        } else {
            std::env::temp_dir()
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if let Some(threads) = self.threads {
            if threads == 0 {
                return Some("threads must be > 0".to_string());
            }
            if threads > 256 {
                return Some(format!("threads too high: {} (max 256)", threads));
            }
        }

        if self.port == 0 {
            return Some("port must be > 0".to_string());
        }

        None
    }
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            output_dir: None,
            port: DEFAULT_PORT,
            threads: None,
            tone_mapping: ToneMapping::default(),
        }
    }
}

/// Returns the platform-specific default model storage path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/musicgen-studio/models
/// - Linux: ~/.cache/musicgen-studio/models
/// - Windows: C:\Users\<user>\AppData\Local\musicgen-studio\cache\models
fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "musicgen-studio") {
        proj_dirs.cache_dir().join("models")
    } else {
        PathBuf::from("./models")
    }
}
