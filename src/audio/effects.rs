//! Post-processing of generated clips into user-facing files.
//!
//! A clip is first rendered as a loudness-normalized 16-bit WAV, then the
//! tone filters are applied to a copy written next to it with a
//! `_modified` suffix.

use std::path::{Path, PathBuf};

use crate::audio::filters;
use crate::audio::loudness::{normalize_loudness, LoudnessSettings};
use crate::audio::wav::{pcm16_spec, read_wav, write_wav};
use crate::config::ToneMapping;
use crate::error::{Result, StudioError};
use crate::types::GeneratedClip;

const MODIFIED_SUFFIX: &str = "_modified";

/// Renders clips and applies the treble/bass filters.
#[derive(Debug, Clone, Copy)]
pub struct AudioPostProcessor {
    tone_mapping: ToneMapping,
    loudness: LoudnessSettings,
}

impl AudioPostProcessor {
    pub fn new(tone_mapping: ToneMapping) -> Self {
        Self {
            tone_mapping,
            loudness: LoudnessSettings::RENDER,
        }
    }

    pub fn tone_mapping(&self) -> ToneMapping {
        self.tone_mapping
    }

    /// Writes a clip as a uniquely named, loudness-normalized WAV in `dir`.
    pub fn render_clip(&self, clip: &GeneratedClip, dir: &Path) -> Result<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix("clip-")
            .suffix(".wav")
            .keep(true)
            .tempfile_in(dir)
            .map_err(|e| {
                StudioError::audio_io(format!(
                    "Failed to create output file in {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        let path = file.path().to_path_buf();
        drop(file);

        let normalized =
            normalize_loudness(&clip.samples, clip.channels, clip.sample_rate, self.loudness);
        write_wav(&normalized, &path, pcm16_spec(clip.channels, clip.sample_rate))?;

        tracing::debug!(
            path = %path.display(),
            duration_sec = clip.duration_sec(),
            "rendered clip"
        );
        Ok(path)
    }

    /// Filters a rendered WAV and writes the result to [`modified_path`].
    ///
    /// The high-pass filter runs first, then the low-pass filter. The legacy
    /// pipeline ran them the other way round; the two orders differ only in
    /// the transient after the first frame. The output keeps the input's
    /// sample rate, channel count and sample format.
    pub fn apply_effects(&self, path: &Path, treble_hz: f32, bass_hz: f32) -> Result<PathBuf> {
        let (mut samples, spec) = read_wav(path)?;
        let (high_pass_hz, low_pass_hz) = self.tone_mapping.cutoffs(treble_hz, bass_hz);

        filters::high_pass(&mut samples, spec.channels, spec.sample_rate, high_pass_hz);
        filters::low_pass(&mut samples, spec.channels, spec.sample_rate, low_pass_hz);

        let output = modified_path(path);
        write_wav(&samples, &output, spec)?;

        tracing::debug!(
            path = %output.display(),
            high_pass_hz,
            low_pass_hz,
            mapping = %self.tone_mapping,
            "applied tone filters"
        );
        Ok(output)
    }

    /// Renders a clip and applies the tone filters, returning the filtered file.
    pub fn process_clip(
        &self,
        clip: &GeneratedClip,
        dir: &Path,
        treble_hz: f32,
        bass_hz: f32,
    ) -> Result<PathBuf> {
        let rendered = self.render_clip(clip, dir)?;
        self.apply_effects(&rendered, treble_hz, bass_hz)
    }
}

impl Default for AudioPostProcessor {
    fn default() -> Self {
        Self::new(ToneMapping::default())
    }
}

/// Derives the filtered file's path: `<stem>_modified.<ext>` beside the input.
///
/// A stem that already ends in `_modified` is not suffixed twice.
pub fn modified_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = stem.strip_suffix(MODIFIED_SUFFIX).unwrap_or(&stem);
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());

    path.with_file_name(format!("{}{}.{}", base, MODIFIED_SUFFIX, ext))
}
