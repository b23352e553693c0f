//! WAV file reading and writing.
//!
//! Reads and writes interleaved f32 samples using the hound crate. Integer
//! formats are scaled to and from [-1, 1].

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{Result, StudioError};

/// Bit depth of rendered files.
pub const PCM_BITS: u16 = 16;

/// Spec for a 16-bit PCM file.
pub fn pcm16_spec(channels: u16, sample_rate: u32) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: PCM_BITS,
        sample_format: SampleFormat::Int,
    }
}

/// Reads a WAV file into interleaved f32 samples.
///
/// Returns the samples together with the file's spec so the caller can
/// write the result back in the same format.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, WavSpec)> {
    let mut reader = WavReader::open(path).map_err(|e| {
        StudioError::audio_io(format!("Failed to open WAV file {}: {}", path.display(), e))
    })?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    }
    .map_err(|e| {
        StudioError::audio_io(format!("Failed to read samples from {}: {}", path.display(), e))
    })?;

    Ok((samples, spec))
}

/// Writes interleaved samples to a WAV file with the given spec.
///
/// Integer formats are clamped to the representable range and truncated
/// toward zero.
pub fn write_wav(samples: &[f32], path: &Path, spec: WavSpec) -> Result<()> {
    let mut writer = WavWriter::create(path, spec).map_err(|e| {
        StudioError::audio_io(format!("Failed to create WAV file {}: {}", path.display(), e))
    })?;

    match spec.sample_format {
        SampleFormat::Float => {
            for sample in samples {
                writer.write_sample(*sample).map_err(|e| {
                    StudioError::audio_io(format!("Failed to write sample: {}", e))
                })?;
            }
        }
        SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            for sample in samples {
                let value = (*sample as f64 * scale).clamp(-scale, scale - 1.0) as i32;
                writer.write_sample(value).map_err(|e| {
                    StudioError::audio_io(format!("Failed to write sample: {}", e))
                })?;
            }
        }
    }

    writer.finalize().map_err(|e| {
        StudioError::audio_io(format!("Failed to finalize WAV file {}: {}", path.display(), e))
    })?;

    Ok(())
}

/// Calculates the duration of audio in seconds from frame count.
pub fn frames_to_duration(frame_count: usize, sample_rate: u32) -> f32 {
    frame_count as f32 / sample_rate as f32
}

fn int_scale(bits_per_sample: u16) -> f64 {
    (1u64 << (bits_per_sample.clamp(8, 32) - 1)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_pcm16_creates_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wav");

        let samples = vec![0.0f32, 0.5, -0.5, 0.0];
        write_wav(&samples, &path, pcm16_spec(1, 32000)).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 32000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
    }

    #[test]
    fn pcm16_read_back_within_quantization() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quant.wav");

        let samples = vec![0.25f32, -0.75, 0.1, 0.0];
        write_wav(&samples, &path, pcm16_spec(2, 32000)).unwrap();
        let (read, spec) = read_wav(&path).unwrap();

        assert_eq!(spec.channels, 2);
        assert_eq!(read.len(), samples.len());
        for (a, b) in samples.iter().zip(&read) {
            assert!((a - b).abs() < 1.0 / 16384.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn int_write_clamps_out_of_range() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");

        write_wav(&[2.0, -2.0], &path, pcm16_spec(1, 8000)).unwrap();
        let raw: Vec<i16> = hound::WavReader::open(&path)
            .unwrap()
            .samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(raw, vec![i16::MAX, i16::MIN]);
    }

    #[test]
    fn float_format_is_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        write_wav(&[0.125, -0.5], &path, spec).unwrap();
        let (read, read_spec) = read_wav(&path).unwrap();
        assert_eq!(read_spec, spec);
        assert_eq!(read, vec![0.125, -0.5]);
    }

    #[test]
    fn read_missing_file_is_audio_error() {
        let err = read_wav(Path::new("/nonexistent/missing.wav")).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::AudioIoFailed);
    }

    #[test]
    fn frames_to_duration_calculation() {
        assert_eq!(frames_to_duration(32000, 32000), 1.0);
        assert_eq!(frames_to_duration(16000, 32000), 0.5);
    }
}
