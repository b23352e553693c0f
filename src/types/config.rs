//! Architecture parameters of a MusicGen ONNX export.

use serde::{Deserialize, Serialize};

/// Configuration parameters for the MusicGen model architecture.
///
/// Read from the export's `config.json`; the decoder needs the layer count
/// to wire the KV cache and the pad token to seed the delay pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Token vocabulary size (2048 for every MusicGen preset).
    pub vocab_size: u32,

    /// Number of decoder transformer layers.
    pub num_hidden_layers: u32,

    /// Number of attention heads in each layer.
    pub num_attention_heads: u32,

    /// Hidden dimension of the T5 text encoder.
    pub d_model: u32,

    /// Key/value dimension per attention head.
    pub d_kv: u32,

    /// Number of audio channels produced by EnCodec.
    pub audio_channels: u16,

    /// Audio sample rate in Hz.
    pub sample_rate: u32,

    /// EnCodec frames per second of audio.
    pub frame_rate: u32,

    /// Number of EnCodec codebooks.
    pub codebooks: u32,

    /// Padding token ID for the decoder.
    pub pad_token_id: i64,
}

impl ModelConfig {
    /// Architecture of musicgen-small, used when an export has no config.json.
    pub fn musicgen_small() -> Self {
        Self {
            vocab_size: 2048,
            num_hidden_layers: 24,
            num_attention_heads: 16,
            d_model: 768,
            d_kv: 64,
            audio_channels: 1,
            sample_rate: 32000,
            frame_rate: 50,
            codebooks: 4,
            pad_token_id: 2048,
        }
    }

    /// Number of decoder steps needed for `duration_sec` seconds of audio.
    pub fn tokens_for_duration(&self, duration_sec: f32) -> usize {
        (duration_sec * self.frame_rate as f32).round().max(1.0) as usize
    }

    /// Validates the configuration for consistency.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.vocab_size == 0 {
            return Some("vocab_size must be > 0".to_string());
        }

        if self.num_hidden_layers == 0 {
            return Some("num_hidden_layers must be > 0".to_string());
        }

        if self.frame_rate == 0 {
            return Some("frame_rate must be > 0".to_string());
        }

        if self.audio_channels == 0 {
            return Some("audio_channels must be > 0".to_string());
        }

        // The decoder's delay pattern is compiled for four codebooks.
        if self.codebooks != 4 {
            return Some(format!("codebooks must be 4, got {}", self.codebooks));
        }

        None
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::musicgen_small()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn musicgen_small_config() {
        let config = ModelConfig::musicgen_small();
        assert_eq!(config.vocab_size, 2048);
        assert_eq!(config.num_hidden_layers, 24);
        assert_eq!(config.sample_rate, 32000);
        assert_eq!(config.codebooks, 4);
        assert!(config.validate().is_none());
    }

    #[test]
    fn config_validation() {
        let mut config = ModelConfig::musicgen_small();
        config.codebooks = 8;
        assert!(config.validate().is_some());
    }

    #[test]
    fn tokens_for_duration() {
        let config = ModelConfig::musicgen_small();
        assert_eq!(config.tokens_for_duration(10.0), 500);
        assert_eq!(config.tokens_for_duration(1.5), 75);
        assert_eq!(config.tokens_for_duration(0.001), 1);
    }
}
