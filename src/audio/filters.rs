//! First-order RC tone filters over interleaved samples.
//!
//! Each channel is filtered independently and the first frame passes
//! through unchanged. Cutoffs are not range checked.

use std::f64::consts::PI;

fn rc_constants(cutoff_hz: f32, sample_rate: u32) -> (f64, f64) {
    let rc = 1.0 / (2.0 * PI * cutoff_hz as f64);
    let dt = 1.0 / sample_rate as f64;
    (rc, dt)
}

/// Applies a one-pole low-pass filter in place.
pub fn low_pass(samples: &mut [f32], channels: u16, sample_rate: u32, cutoff_hz: f32) {
    let channels = channels.max(1) as usize;
    if samples.len() < channels {
        return;
    }
    let (rc, dt) = rc_constants(cutoff_hz, sample_rate);
    let alpha = dt / (rc + dt);

    let mut last: Vec<f64> = samples[..channels].iter().map(|&s| s as f64).collect();
    for frame in samples.chunks_mut(channels).skip(1) {
        for (sample, prev) in frame.iter_mut().zip(last.iter_mut()) {
            *prev += alpha * (*sample as f64 - *prev);
            *sample = *prev as f32;
        }
    }
}

/// Applies a one-pole high-pass filter in place.
pub fn high_pass(samples: &mut [f32], channels: u16, sample_rate: u32, cutoff_hz: f32) {
    let channels = channels.max(1) as usize;
    if samples.len() < channels {
        return;
    }
    let (rc, dt) = rc_constants(cutoff_hz, sample_rate);
    let alpha = 1.0 / (1.0 + dt / rc);

    let mut last_out: Vec<f64> = samples[..channels].iter().map(|&s| s as f64).collect();
    let mut last_in = last_out.clone();
    for frame in samples.chunks_mut(channels).skip(1) {
        for (c, sample) in frame.iter_mut().enumerate() {
            let x = *sample as f64;
            last_out[c] = alpha * (last_out[c] + x - last_in[c]);
            last_in[c] = x;
            *sample = last_out[c] as f32;
        }
    }
}
