//! Melody preparation: channel conversion and sample-rate conversion.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{Result, StudioError};
use crate::types::Melody;

const SINC_LEN: usize = 256;

/// Converts a melody to the model's channel count and sample rate.
///
/// Mono input is duplicated to every target channel; multichannel input is
/// averaged first. An empty melody or one already at the target rate skips
/// resampling.
pub fn prepare_melody(melody: &Melody, target_rate: u32, target_channels: u16) -> Result<Melody> {
    let target_channels = target_channels.max(1);
    let mono = downmix(&melody.samples, melody.channels);

    let resampled = if mono.is_empty() || melody.sample_rate == target_rate {
        mono
    } else {
        resample_mono(&mono, melody.sample_rate, target_rate)?
    };

    let samples = if target_channels == 1 {
        resampled
    } else {
        resampled
            .iter()
            .flat_map(|&s| std::iter::repeat(s).take(target_channels as usize))
            .collect()
    };

    Ok(Melody {
        sample_rate: target_rate,
        channels: target_channels,
        samples,
    })
}

fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling of a mono signal in a single chunk.
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == 0 || to_rate == 0 {
        return Err(StudioError::audio_io(format!(
            "Cannot resample from {} Hz to {} Hz",
            from_rate, to_rate
        )));
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let expected = (samples.len() as f64 * ratio).round() as usize;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    // Zero padding flushes the filter so the delayed tail is produced.
    let padding = SINC_LEN * 2 + (SINC_LEN as f64 / ratio).ceil() as usize;
    let mut input = Vec::with_capacity(samples.len() + padding);
    input.extend_from_slice(samples);
    input.resize(samples.len() + padding, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, input.len(), 1)
        .map_err(|e| StudioError::audio_io(format!("Failed to create resampler: {}", e)))?;
    let delay = resampler.output_delay();

    let output = resampler
        .process(&[input], None)
        .map_err(|e| StudioError::audio_io(format!("Failed to resample melody: {}", e)))?;

    let channel = output.into_iter().next().unwrap_or_default();
    let end = (delay + expected).min(channel.len());
    let start = delay.min(end);
    let mut resampled = channel[start..end].to_vec();
    resampled.resize(expected, 0.0);

    tracing::debug!(from_rate, to_rate, frames = resampled.len(), "resampled melody");
    Ok(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_mono_is_unchanged() {
        let melody = Melody::mono(vec![0.1, 0.2, 0.3], 32000);
        let prepared = prepare_melody(&melody, 32000, 1).unwrap();
        assert_eq!(prepared, melody);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let melody = Melody {
            sample_rate: 32000,
            channels: 2,
            samples: vec![0.2, 0.4, -1.0, 1.0],
        };
        let prepared = prepare_melody(&melody, 32000, 1).unwrap();
        assert_eq!(prepared.channels, 1);
        assert_eq!(prepared.samples.len(), 2);
        assert!((prepared.samples[0] - 0.3).abs() < 1e-6);
        assert!(prepared.samples[1].abs() < 1e-6);
    }

    #[test]
    fn mono_is_duplicated_for_stereo_models() {
        let melody = Melody::mono(vec![0.5, -0.5], 32000);
        let prepared = prepare_melody(&melody, 32000, 2).unwrap();
        assert_eq!(prepared.samples, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn resampling_scales_length() {
        let samples: Vec<f32> = (0..44100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin() * 0.5)
            .collect();
        let melody = Melody::mono(samples, 44100);
        let prepared = prepare_melody(&melody, 32000, 1).unwrap();
        assert_eq!(prepared.sample_rate, 32000);
        assert_eq!(prepared.samples.len(), 32000);

        let mid = &prepared.samples[8000..24000];
        let peak = mid.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6, "peak {}", peak);
    }

    #[test]
    fn empty_melody_skips_resampling() {
        let melody = Melody::mono(vec![], 44100);
        let prepared = prepare_melody(&melody, 32000, 1).unwrap();
        assert!(prepared.samples.is_empty());
        assert_eq!(prepared.sample_rate, 32000);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(resample_mono(&[0.0; 10], 0, 32000).is_err());
    }
}
