//! Text encoder wrapper for MusicGen.
//!
//! Handles tokenization and T5 text encoding for text prompts.

use std::path::Path;

use ort::session::Session;
use ort::value::{DynValue, Tensor};
use tokenizers::Tokenizer;

use crate::error::{Result, StudioError};

use super::loader::session_from_file;

/// Encoder output for one prompt.
pub struct EncodedPrompt {
    /// `last_hidden_state` of the T5 encoder, `[1, tokens, d_model]`.
    pub hidden_states: DynValue,
    /// All-ones mask over the prompt tokens, `[1, tokens]`.
    pub attention_mask: DynValue,
    /// Number of prompt tokens including the end-of-sequence token.
    pub token_count: usize,
}

/// MusicGen text encoder combining tokenizer and T5 encoder.
pub struct MusicGenTextEncoder {
    tokenizer: Tokenizer,
    text_encoder: Session,
}

impl MusicGenTextEncoder {
    /// Loads `tokenizer.json` and `text_encoder.onnx` from the given directory.
    pub fn load(model_dir: &Path, threads: Option<u32>) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json")).map_err(|e| {
            StudioError::model_load_failed(format!("Failed to load tokenizer: {}", e))
        })?;

        tokenizer
            .with_padding(None)
            .with_truncation(None)
            .map_err(|e| {
                StudioError::model_load_failed(format!("Failed to configure tokenizer: {}", e))
            })?;

        let text_encoder = session_from_file(&model_dir.join("text_encoder.onnx"), threads)?;

        Ok(Self {
            tokenizer,
            text_encoder,
        })
    }

    /// Encodes one prompt.
    ///
    /// An empty prompt still yields the end-of-sequence token, which the
    /// decoder treats as an unconditional description.
    pub fn encode(&mut self, text: &str) -> Result<EncodedPrompt> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| StudioError::model_inference_failed(format!("Tokenization failed: {}", e)))?
            .get_ids()
            .iter()
            .map(|e| *e as i64)
            .collect::<Vec<_>>();

        let token_count = tokens.len();
        if token_count == 0 {
            return Err(StudioError::model_inference_failed(
                "Tokenizer produced no tokens",
            ));
        }

        let input_ids = Tensor::from_array(([1, token_count], tokens)).map_err(|e| {
            StudioError::model_inference_failed(format!("Failed to create input tensor: {}", e))
        })?;
        let encoder_mask = attention_mask(token_count)?;

        let mut output = self
            .text_encoder
            .run(ort::inputs![input_ids, encoder_mask])
            .map_err(|e| {
                StudioError::model_inference_failed(format!("Text encoder inference failed: {}", e))
            })?;

        let hidden_states = output.remove("last_hidden_state").ok_or_else(|| {
            StudioError::model_inference_failed("last_hidden_state not found in output")
        })?;

        Ok(EncodedPrompt {
            hidden_states,
            attention_mask: attention_mask(token_count)?.into_dyn(),
            token_count,
        })
    }
}

fn attention_mask(len: usize) -> Result<Tensor<i64>> {
    Tensor::from_array(([1, len], vec![1i64; len])).map_err(|e| {
        StudioError::model_inference_failed(format!("Failed to create attention mask: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tokenizer_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = MusicGenTextEncoder::load(dir.path(), None).err().unwrap();
        assert_eq!(err.code, crate::error::ErrorCode::ModelLoadFailed);
    }
}
