//! MusicGen decoder wrapper with KV cache support.
//!
//! The export is split in two: `decoder_model.onnx` runs the first step and
//! produces the key/value cache, `decoder_with_past_model.onnx` runs every
//! following step from the cache.

use std::borrow::Cow;
use std::path::Path;

use half::f16;
use ort::session::{Session, SessionInputValue, SessionOutputs};
use ort::value::{DynValue, Tensor};
use rand::Rng;

use crate::error::{Result, StudioError};
use crate::types::{ModelConfig, SamplingParams};

use super::delay_pattern::DelayPatternMaskIds;
use super::loader::session_from_file;
use super::logits::Logits;
use super::text_encoder::EncodedPrompt;

/// Codebooks supported by the ONNX exports.
pub const CODEBOOKS: usize = 4;

/// Conditional and unconditional copies of every codebook.
const GUIDED_BATCH: usize = CODEBOOKS * 2;

/// MusicGen decoder using split architecture with KV cache.
pub struct MusicGenDecoder {
    decoder_model: Session,
    decoder_with_past: Session,
    config: ModelConfig,
}

impl MusicGenDecoder {
    /// Loads `decoder_model.onnx` and `decoder_with_past_model.onnx`.
    pub fn load(model_dir: &Path, config: ModelConfig, threads: Option<u32>) -> Result<Self> {
        if config.codebooks as usize != CODEBOOKS {
            return Err(StudioError::model_load_failed(format!(
                "Exports with {} codebooks are not supported (expected {})",
                config.codebooks, CODEBOOKS
            )));
        }

        let decoder_model = session_from_file(&model_dir.join("decoder_model.onnx"), threads)?;
        let decoder_with_past =
            session_from_file(&model_dir.join("decoder_with_past_model.onnx"), threads)?;

        Ok(Self {
            decoder_model,
            decoder_with_past,
            config,
        })
    }

    /// Generates `max_len` frames of codebook tokens for one prompt.
    ///
    /// `progress` receives the number of frames produced so far after every
    /// step; an error from it stops generation and is returned as is.
    pub fn generate_tokens<R: Rng + ?Sized>(
        &mut self,
        prompt: EncodedPrompt,
        max_len: usize,
        sampling: &SamplingParams,
        rng: &mut R,
        progress: &mut dyn FnMut(usize) -> Result<()>,
    ) -> Result<Vec<[i64; CODEBOOKS]>> {
        let num_hidden_layers = self.config.num_hidden_layers as usize;
        let pad_token_id = self.config.pad_token_id;

        // Zeroed copies form the unconditional half of the guidance batch.
        let encoder_hidden_states = duplicate_with_zeros(&prompt.hidden_states)?;
        let encoder_attention_mask = duplicate_with_zeros_typed::<i64>(&prompt.attention_mask)?;

        let initial_input_ids = Tensor::from_array(([GUIDED_BATCH, 1], vec![pad_token_id; GUIDED_BATCH]))
            .map_err(|e| {
                StudioError::model_inference_failed(format!("Failed to create input_ids: {}", e))
            })?;

        let session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
            (
                Cow::from("encoder_attention_mask"),
                SessionInputValue::from(encoder_attention_mask.view()),
            ),
            (
                Cow::from("encoder_hidden_states"),
                SessionInputValue::from(encoder_hidden_states.view()),
            ),
            (
                Cow::from("input_ids"),
                SessionInputValue::from(initial_input_ids.view()),
            ),
        ];

        let mut outputs = self.decoder_model.run(session_inputs).map_err(|e| {
            StudioError::model_inference_failed(format!("Initial decoder inference failed: {}", e))
        })?;

        let mut delay_pattern = DelayPatternMaskIds::<CODEBOOKS>::new();
        delay_pattern.push(next_tokens(&mut outputs, sampling, rng)?);

        let mut kv_cache: Vec<(String, DynValue)> = Vec::with_capacity(num_hidden_layers * 4);
        for j in 0..num_hidden_layers {
            for part in ["decoder.key", "decoder.value", "encoder.key", "encoder.value"] {
                let value = take_output(&mut outputs, &format!("present.{j}.{part}"))?;
                kv_cache.push((format!("past_key_values.{j}.{part}"), value));
            }
        }
        drop(outputs);

        let mut results = Vec::with_capacity(max_len);

        while results.len() < max_len {
            let [a, b, c, d] = delay_pattern.last_delayed_masked(pad_token_id);
            let input_ids = Tensor::from_array(([GUIDED_BATCH, 1], vec![a, b, c, d, a, b, c, d]))
                .map_err(|e| {
                    StudioError::model_inference_failed(format!("Failed to create input_ids: {}", e))
                })?;

            let mut session_inputs: Vec<(Cow<str>, SessionInputValue)> = vec![
                (Cow::from("input_ids"), SessionInputValue::from(input_ids.view())),
                (
                    Cow::from("encoder_attention_mask"),
                    SessionInputValue::from(encoder_attention_mask.view()),
                ),
            ];
            for (k, v) in &kv_cache {
                session_inputs.push((Cow::from(k.as_str()), SessionInputValue::from(v.view())));
            }

            let mut outputs = self.decoder_with_past.run(session_inputs).map_err(|e| {
                StudioError::model_inference_failed(format!(
                    "Decoder with past inference failed: {}",
                    e
                ))
            })?;

            delay_pattern.push(next_tokens(&mut outputs, sampling, rng)?);

            if let Some(frame) = delay_pattern.last_de_delayed() {
                results.push(frame);
                progress(results.len())?;
            }

            // Encoder keys and values stay fixed; only the decoder half changes.
            for j in 0..num_hidden_layers {
                kv_cache[j * 4].1 = take_output(&mut outputs, &format!("present.{j}.decoder.key"))?;
                kv_cache[j * 4 + 1].1 =
                    take_output(&mut outputs, &format!("present.{j}.decoder.value"))?;
            }
        }

        Ok(results)
    }
}

fn take_output(outputs: &mut SessionOutputs<'_>, name: &str) -> Result<DynValue> {
    outputs
        .remove(name)
        .ok_or_else(|| StudioError::model_inference_failed(format!("{} not found in output", name)))
}

/// Applies guidance and samples one token per codebook.
fn next_tokens<R: Rng + ?Sized>(
    outputs: &mut SessionOutputs<'_>,
    sampling: &SamplingParams,
    rng: &mut R,
) -> Result<[i64; CODEBOOKS]> {
    let logits_value = take_output(outputs, "logits")?;
    let tokens = Logits::from_3d_dyn_value(&logits_value)?
        .apply_free_guidance(sampling.cfg_coef)?
        .sample(sampling, rng)?;

    let count = tokens.len();
    tokens.try_into().map_err(|_| {
        StudioError::model_inference_failed(format!(
            "Expected {} codebook tokens per step, got {}",
            CODEBOOKS, count
        ))
    })
}

/// Duplicates a tensor along the first dimension, filling the copy with zeros.
///
/// Handles both fp16 and fp32 exports.
fn duplicate_with_zeros(tensor: &DynValue) -> Result<DynValue> {
    if let Ok(result) = duplicate_with_zeros_typed::<f16>(tensor) {
        return Ok(result);
    }
    duplicate_with_zeros_typed::<f32>(tensor)
}

fn duplicate_with_zeros_typed<T>(tensor: &DynValue) -> Result<DynValue>
where
    T: ort::tensor::PrimitiveTensorElementType + Clone + Default + std::fmt::Debug + 'static,
{
    let (shape, data) = tensor.try_extract_tensor::<T>().map_err(|e| {
        StudioError::model_inference_failed(format!("Failed to extract tensor: {}", e))
    })?;

    let mut new_shape: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
    if let Some(batch) = new_shape.first_mut() {
        *batch *= 2;
    }

    let mut combined = data.to_vec();
    combined.resize(data.len() * 2, T::default());

    let result = Tensor::from_array((new_shape, combined)).map_err(|e| {
        StudioError::model_inference_failed(format!("Failed to create duplicated tensor: {}", e))
    })?;

    Ok(result.into_dyn())
}
