//! Logits processing for MusicGen decoder output.
//!
//! Handles classifier-free guidance and token selection: greedy, top-k,
//! nucleus (top-p) or plain multinomial sampling.

use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};

use half::f16;
use ndarray::{s, Array, Array2, ArrayView1, Axis, Ix3, IxDyn};
use ort::tensor::ArrayExtensions;
use ort::value::DynValue;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

use crate::error::{Result, StudioError};
use crate::types::SamplingParams;

/// Wrapper around 2D logits array with processing methods.
pub struct Logits(Array2<f32>);

impl Deref for Logits {
    type Target = Array2<f32>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Logits {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Debug for Logits {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logits({:?})", self.0.dim())
    }
}

impl From<Array2<f32>> for Logits {
    fn from(arr: Array2<f32>) -> Self {
        Self(arr)
    }
}

impl Logits {
    /// Creates Logits from a 3D DynValue, supporting both f32 and f16.
    ///
    /// The input shape is `[batch_size, decoder_sequence_length, vocab_size]`
    /// with a sequence length of 1, which is dropped.
    pub fn from_3d_dyn_value(value: &DynValue) -> Result<Self> {
        let (shape, data): (Vec<usize>, Vec<f32>) =
            if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                (shape.iter().map(|&x| x as usize).collect(), data.to_vec())
            } else if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
                (
                    shape.iter().map(|&x| x as usize).collect(),
                    data.iter().map(|e| f32::from(*e)).collect(),
                )
            } else {
                return Err(StudioError::model_inference_failed(
                    "Logits must be f32 or f16",
                ));
            };

        let arr = Array::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
            StudioError::model_inference_failed(format!("Failed to create array: {}", e))
        })?;

        let arr = arr.into_dimensionality::<Ix3>().map_err(|e| {
            StudioError::model_inference_failed(format!("Expected 3D logits: {}", e))
        })?;

        Ok(Self(arr.remove_axis(Axis(1))))
    }

    /// Applies classifier-free guidance to the logits.
    ///
    /// The first half of the batch holds conditional logits and the second
    /// half unconditional ones. The result is
    /// `uncond + (cond - uncond) * scale`.
    pub fn apply_free_guidance(self, scale: f32) -> Result<Self> {
        let rows = self.0.dim().0;
        if rows % 2 != 0 {
            return Err(StudioError::model_inference_failed(format!(
                "Guidance needs an even batch of logits, got {} rows",
                rows
            )));
        }

        let half = rows / 2;
        let cond = self.0.slice(s![0..half, ..]);
        let uncond = self.0.slice(s![half.., ..]);
        Ok(Self((cond.into_owned() - uncond) * scale + uncond))
    }

    /// Picks one token per row according to the sampling parameters.
    ///
    /// A temperature of 0 takes the argmax. Otherwise nucleus sampling is
    /// used when `top_p > 0`, top-k when `top_k > 0`, and the full
    /// distribution when both are disabled.
    pub fn sample<R: Rng + ?Sized>(&self, params: &SamplingParams, rng: &mut R) -> Result<Vec<i64>> {
        if params.temperature <= 0.0 {
            return Ok(self.0.axis_iter(Axis(0)).map(argmax).collect());
        }

        let probs = (&self.0 / params.temperature).softmax(Axis(1));
        probs
            .axis_iter(Axis(0))
            .map(|row| {
                let mut ranked: Vec<(i64, f32)> =
                    row.iter().enumerate().map(|(i, p)| (i as i64, *p)).collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

                if params.top_p > 0.0 {
                    keep_nucleus(&mut ranked, params.top_p);
                } else if params.top_k > 0 {
                    ranked.truncate(params.top_k.min(ranked.len()));
                }
                draw(&ranked, rng)
            })
            .collect()
    }
}

fn argmax(row: ArrayView1<f32>) -> i64 {
    row.iter()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0 as i64
}

/// Keeps the smallest prefix of ranked tokens whose mass exceeds `p`.
fn keep_nucleus(ranked: &mut Vec<(i64, f32)>, p: f32) {
    let mut cumulative = 0.0;
    let mut keep = 0;
    for &(_, prob) in ranked.iter() {
        if cumulative > p {
            break;
        }
        cumulative += prob;
        keep += 1;
    }
    ranked.truncate(keep.max(1));
}

fn draw<R: Rng + ?Sized>(candidates: &[(i64, f32)], rng: &mut R) -> Result<i64> {
    let distribution = WeightedIndex::new(candidates.iter().map(|e| e.1)).map_err(|e| {
        StudioError::model_inference_failed(format!("Invalid token distribution: {}", e))
    })?;
    Ok(candidates[distribution.sample(rng)].0)
}
