//! Integrated loudness (ITU-R BS.1770) and loudness normalization.
//!
//! Samples are K-weighted per channel (high shelf followed by a high-pass),
//! squared, and averaged over 400 ms blocks with 75% overlap. Blocks quieter
//! than -70 LUFS are dropped, then blocks more than 10 LU below the mean of
//! the remainder.

use std::f64::consts::PI;

/// Root-mean-square energy below which a signal is left untouched.
pub const ENERGY_FLOOR: f32 = 2e-3;

const BLOCK_SEC: f64 = 0.4;
const BLOCK_OVERLAP: f64 = 0.75;
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;
const LOUDNESS_OFFSET: f64 = -0.691;

/// Loudness normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessSettings {
    /// Target loudness is `-headroom_db` LUFS.
    pub headroom_db: f64,
    /// Apply `tanh` soft clipping after the gain.
    pub compressor: bool,
}

impl LoudnessSettings {
    /// Settings used for every rendered clip.
    pub const RENDER: LoudnessSettings = LoudnessSettings {
        headroom_db: 16.0,
        compressor: true,
    };
}

impl Default for LoudnessSettings {
    fn default() -> Self {
        Self::RENDER
    }
}

#[derive(Debug, Clone, Copy)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// Stage one of the K-weighting curve: a +4 dB shelf above ~1.7 kHz.
    ///
    /// Bilinear design with the analog prototype's pole and zero placement,
    /// so the response matches the published 48 kHz coefficients and stays
    /// correct at other rates.
    fn k_shelf(sample_rate: f64) -> Self {
        const F0: f64 = 1681.974450955533;
        const GAIN_DB: f64 = 3.999843853973347;
        const Q: f64 = 0.7071752369554196;

        let k = (PI * F0 / sample_rate).tan();
        let vh = 10f64.powf(GAIN_DB / 20.0);
        let vb = vh.powf(0.4996667741545416);
        let a0 = 1.0 + k / Q + k * k;

        Self {
            b0: (vh + vb * k / Q + k * k) / a0,
            b1: 2.0 * (k * k - vh) / a0,
            b2: (vh - vb * k / Q + k * k) / a0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / Q + k * k) / a0,
        }
    }

    /// Stage two of the K-weighting curve: the RLB high-pass near 38 Hz.
    /// The numerator stays `[1, -2, 1]`, unnormalized.
    fn k_high_pass(sample_rate: f64) -> Self {
        const F0: f64 = 38.13547087602444;
        const Q: f64 = 0.5003270373238773;

        let k = (PI * F0 / sample_rate).tan();
        let a0 = 1.0 + k / Q + k * k;

        Self {
            b0: 1.0,
            b1: -2.0,
            b2: 1.0,
            a1: 2.0 * (k * k - 1.0) / a0,
            a2: (1.0 - k / Q + k * k) / a0,
        }
    }

    /// Direct form I over a whole channel.
    fn apply(&self, input: &[f64]) -> Vec<f64> {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0, 0.0, 0.0, 0.0);
        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + self.b1 * x1 + self.b2 * x2 - self.a1 * y1 - self.a2 * y2;
                x2 = x1;
                x1 = x;
                y2 = y1;
                y1 = y;
                y
            })
            .collect()
    }
}

/// Channel weights for up to five channels (L, R, C, Ls, Rs).
fn channel_weight(channel: usize) -> f64 {
    if channel < 3 {
        1.0
    } else {
        1.41
    }
}

fn k_weight(channel: &[f64], sample_rate: f64) -> Vec<f64> {
    let shelf = Biquad::k_shelf(sample_rate);
    let high_pass = Biquad::k_high_pass(sample_rate);
    high_pass.apply(&shelf.apply(channel))
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f64>> {
    let frames = samples.len() / channels;
    (0..channels)
        .map(|c| (0..frames).map(|i| samples[i * channels + c] as f64).collect())
        .collect()
}

/// Mean square of each K-weighted channel over each gating block.
fn block_energies(weighted: &[Vec<f64>], sample_rate: f64) -> Vec<Vec<f64>> {
    let frames = weighted.first().map_or(0, Vec::len);
    let block_len = (BLOCK_SEC * sample_rate).round() as usize;
    let step = ((block_len as f64) * (1.0 - BLOCK_OVERLAP)).round().max(1.0) as usize;

    let mut ranges = Vec::new();
    if frames < block_len {
        ranges.push((0, frames));
    } else {
        let mut start = 0;
        while start + block_len <= frames {
            ranges.push((start, start + block_len));
            start += step;
        }
    }

    weighted
        .iter()
        .map(|channel| {
            ranges
                .iter()
                .map(|&(lo, hi)| {
                    let n = (hi - lo).max(1) as f64;
                    channel[lo..hi].iter().map(|v| v * v).sum::<f64>() / n
                })
                .collect()
        })
        .collect()
}

fn loudness_of(weighted_energy: f64) -> f64 {
    LOUDNESS_OFFSET + 10.0 * weighted_energy.log10()
}

/// Gated mean energy per channel, weighted and summed.
fn gated_energy(energies: &[Vec<f64>], gate: &[bool]) -> Option<f64> {
    let count = gate.iter().filter(|&&g| g).count();
    if count == 0 {
        return None;
    }
    let total = energies
        .iter()
        .enumerate()
        .map(|(c, blocks)| {
            let sum: f64 = blocks
                .iter()
                .zip(gate)
                .filter(|(_, &g)| g)
                .map(|(e, _)| e)
                .sum();
            channel_weight(c) * sum / count as f64
        })
        .sum();
    Some(total)
}

/// Integrated loudness of interleaved samples in LUFS.
///
/// Returns negative infinity when every block falls below the absolute
/// gate (silence). A clip shorter than one block is measured as a single
/// block.
pub fn integrated_loudness(samples: &[f32], channels: u16, sample_rate: u32) -> f64 {
    let channels = channels.max(1) as usize;
    if samples.len() < channels || sample_rate == 0 {
        return f64::NEG_INFINITY;
    }

    let rate = sample_rate as f64;
    let weighted: Vec<Vec<f64>> = deinterleave(samples, channels)
        .iter()
        .map(|ch| k_weight(ch, rate))
        .collect();
    let energies = block_energies(&weighted, rate);
    let block_count = energies.first().map_or(0, Vec::len);

    let block_loudness: Vec<f64> = (0..block_count)
        .map(|j| {
            let e: f64 = energies
                .iter()
                .enumerate()
                .map(|(c, blocks)| channel_weight(c) * blocks[j])
                .sum();
            loudness_of(e)
        })
        .collect();

    let absolute: Vec<bool> = block_loudness.iter().map(|&l| l > ABSOLUTE_GATE_LUFS).collect();
    let Some(abs_energy) = gated_energy(&energies, &absolute) else {
        return f64::NEG_INFINITY;
    };
    let relative_gate = loudness_of(abs_energy) + RELATIVE_GATE_LU;

    let gate: Vec<bool> = block_loudness
        .iter()
        .zip(&absolute)
        .map(|(&l, &a)| a && l > relative_gate)
        .collect();

    match gated_energy(&energies, &gate) {
        Some(e) => loudness_of(e),
        None => f64::NEG_INFINITY,
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Scales interleaved samples so their loudness is `-headroom_db` LUFS.
///
/// Quiet input (RMS below [`ENERGY_FLOOR`]) is returned unchanged. The
/// result is always clamped to [-1, 1].
pub fn normalize_loudness(
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
    settings: LoudnessSettings,
) -> Vec<f32> {
    if rms(samples) < ENERGY_FLOOR {
        return samples.to_vec();
    }

    let input_lufs = integrated_loudness(samples, channels, sample_rate);
    if !input_lufs.is_finite() {
        return samples.to_vec();
    }

    let delta_db = -settings.headroom_db - input_lufs;
    let gain = 10f64.powf(delta_db / 20.0) as f32;
    tracing::debug!(input_lufs, gain, "normalizing loudness");

    samples
        .iter()
        .map(|&s| {
            let scaled = s * gain;
            let shaped = if settings.compressor { scaled.tanh() } else { scaled };
            shaped.clamp(-1.0, 1.0)
        })
        .collect()
}
