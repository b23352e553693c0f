//! Named MusicGen presets selectable from the interface.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// One of the four pretrained MusicGen checkpoints offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelPreset {
    #[serde(rename = "facebook/musicgen-melody")]
    Melody,
    #[serde(rename = "facebook/musicgen-medium")]
    Medium,
    #[serde(rename = "facebook/musicgen-small")]
    Small,
    #[serde(rename = "facebook/musicgen-large")]
    Large,
}

impl ModelPreset {
    /// All presets in the order the interface lists them.
    pub const ALL: [ModelPreset; 4] = [
        ModelPreset::Melody,
        ModelPreset::Medium,
        ModelPreset::Small,
        ModelPreset::Large,
    ];

    /// Preset selected when the user has not picked one.
    pub const DEFAULT: ModelPreset = ModelPreset::Large;

    /// HuggingFace identifier of the checkpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPreset::Melody => "facebook/musicgen-melody",
            ModelPreset::Medium => "facebook/musicgen-medium",
            ModelPreset::Small => "facebook/musicgen-small",
            ModelPreset::Large => "facebook/musicgen-large",
        }
    }

    /// Directory name of the preset's ONNX export under the model root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ModelPreset::Melody => "musicgen-melody",
            ModelPreset::Medium => "musicgen-medium",
            ModelPreset::Small => "musicgen-small",
            ModelPreset::Large => "musicgen-large",
        }
    }

    /// Whether the checkpoint was trained with a chroma conditioner.
    pub fn supports_melody(&self) -> bool {
        matches!(self, ModelPreset::Melody)
    }

    /// Resolves a preset from its identifier.
    ///
    /// Unknown names are a model-load failure, not a validation failure.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str() == name.trim())
            .ok_or_else(|| StudioError::unknown_model(name))
    }
}

impl std::fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
