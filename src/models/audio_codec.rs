//! Audio codec wrapper for MusicGen.
//!
//! Decodes codebook frames into audio samples using EnCodec.

use std::path::Path;

use half::f16;
use ort::session::Session;
use ort::value::DynValue;
use ort::value::Tensor;

use crate::error::{Result, StudioError};

use super::decoder::CODEBOOKS;
use super::loader::session_from_file;

/// MusicGen audio codec (EnCodec decoder).
pub struct MusicGenAudioCodec {
    audio_codec: Session,
}

impl MusicGenAudioCodec {
    /// Loads `encodec_decode.onnx` from the directory.
    pub fn load(model_dir: &Path, threads: Option<u32>) -> Result<Self> {
        let audio_codec = session_from_file(&model_dir.join("encodec_decode.onnx"), threads)?;
        Ok(Self { audio_codec })
    }

    /// Decodes frames of codebook tokens into interleaved samples.
    ///
    /// EnCodec returns `[1, channels, samples]`; multichannel output is
    /// interleaved frame by frame.
    pub fn decode(&mut self, frames: &[[i64; CODEBOOKS]], channels: u16) -> Result<Vec<f32>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let seq_len = frames.len();
        let input_tensor = Tensor::from_array(([1usize, 1, CODEBOOKS, seq_len], codebook_major(frames)))
            .map_err(|e| {
                StudioError::model_inference_failed(format!("Failed to create token tensor: {}", e))
            })?;

        let mut outputs = self
            .audio_codec
            .run(ort::inputs![input_tensor])
            .map_err(|e| {
                StudioError::model_inference_failed(format!("Audio codec inference failed: {}", e))
            })?;

        let audio_values: DynValue = outputs.remove("audio_values").ok_or_else(|| {
            StudioError::model_inference_failed("audio_values not found in output")
        })?;

        let planar: Vec<f32> = if let Ok((_shape, data)) = audio_values.try_extract_tensor::<f32>() {
            data.to_vec()
        } else if let Ok((_shape, data)) = audio_values.try_extract_tensor::<f16>() {
            data.iter().map(|e| f32::from(*e)).collect()
        } else {
            return Err(StudioError::model_inference_failed(
                "Audio values must be either f16 or f32",
            ));
        };

        Ok(interleave(planar, channels))
    }
}

/// Reorders `[seq_len][CODEBOOKS]` frames into `[CODEBOOKS][seq_len]`.
fn codebook_major(frames: &[[i64; CODEBOOKS]]) -> Vec<i64> {
    let seq_len = frames.len();
    let mut out = vec![0i64; seq_len * CODEBOOKS];
    for (i, frame) in frames.iter().enumerate() {
        for (j, id) in frame.iter().enumerate() {
            out[j * seq_len + i] = *id;
        }
    }
    out
}

/// Converts channel-planar samples to interleaved order.
fn interleave(planar: Vec<f32>, channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return planar;
    }
    let frames = planar.len() / channels;
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for c in 0..channels {
            out.push(planar[c * frames + i]);
        }
    }
    out
}
