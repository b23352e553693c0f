//! Model downloader for MusicGen ONNX exports.
//!
//! Fetches a preset's files from HuggingFace when they are not present
//! locally. Only presets with a published ONNX export can be downloaded;
//! the others must be exported and placed under the model root by hand.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Result, StudioError};
use crate::types::ModelPreset;

use super::loader::missing_files;

/// HuggingFace URLs for the musicgen-small export (fp16 weights).
const SMALL_URLS: &[(&str, &str)] = &[
    (
        "config.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/config.json",
    ),
    (
        "tokenizer.json",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small/tokenizer.json",
    ),
    (
        "text_encoder.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/text_encoder.onnx",
    ),
    (
        "decoder_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_model.onnx",
    ),
    (
        "decoder_with_past_model.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/decoder_with_past_model.onnx",
    ),
    (
        "encodec_decode.onnx",
        "https://huggingface.co/gabotechs/music_gen/resolve/main/small_fp16/encodec_decode.onnx",
    ),
];

/// Download sources for a preset, if it has any.
pub fn model_urls(preset: ModelPreset) -> Option<&'static [(&'static str, &'static str)]> {
    match preset {
        ModelPreset::Small => Some(SMALL_URLS),
        ModelPreset::Melody | ModelPreset::Medium | ModelPreset::Large => None,
    }
}

/// Makes sure every required file of `preset` is present in `model_dir`.
///
/// Downloads missing files when the preset has a download source and fails
/// with MODEL_NOT_FOUND when it does not.
pub fn ensure_models(model_dir: &Path, preset: ModelPreset) -> Result<()> {
    let missing = missing_files(model_dir);
    if missing.is_empty() {
        tracing::debug!(preset = %preset, "all model files present");
        return Ok(());
    }

    let Some(urls) = model_urls(preset) else {
        return Err(StudioError::model_not_found(format!(
            "{} (missing: {}; no download source for {})",
            model_dir.display(),
            missing.join(", "),
            preset
        )));
    };

    fs::create_dir_all(model_dir).map_err(|e| {
        StudioError::model_download_failed(format!(
            "Failed to create model directory {}: {}",
            model_dir.display(),
            e
        ))
    })?;

    tracing::info!(
        preset = %preset,
        count = missing.len(),
        "downloading missing model files (this may take several minutes)"
    );

    for file in &missing {
        let url = urls
            .iter()
            .find(|(name, _)| name == file)
            .map(|(_, url)| *url)
            .ok_or_else(|| {
                StudioError::model_download_failed(format!("No download URL for {}", file))
            })?;
        download_file_streaming(url, &model_dir.join(file))?;
    }

    let config_path = model_dir.join("config.json");
    if !config_path.exists() {
        if let Some((_, url)) = urls.iter().find(|(name, _)| *name == "config.json") {
            if let Err(e) = download_file_streaming(url, &config_path) {
                tracing::warn!(error = %e, "config.json download failed, using defaults");
            }
        }
    }

    tracing::info!(preset = %preset, "model files downloaded");
    Ok(())
}

/// Downloads a file using streaming to handle large files.
///
/// Data is written to a `.part` file that is renamed once complete, so an
/// interrupted download never leaves a truncated model behind.
fn download_file_streaming(url: &str, dest: &Path) -> Result<()> {
    let filename = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    tracing::info!(file = %filename, "downloading");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| {
            StudioError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })?;

    let mut response = client.get(url).send().map_err(|e| {
        StudioError::model_download_failed(format!("Failed to download {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(StudioError::model_download_failed(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let partial = dest.with_extension("part");

    let mut file = fs::File::create(&partial).map_err(|e| {
        StudioError::model_download_failed(format!(
            "Failed to create file {}: {}",
            partial.display(),
            e
        ))
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];
    let mut last_progress = 0;

    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| {
            StudioError::model_download_failed(format!("Failed to read response: {}", e))
        })?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read]).map_err(|e| {
            StudioError::model_download_failed(format!("Failed to write file: {}", e))
        })?;

        downloaded += bytes_read as u64;

        if total_size > 0 {
            let progress = (downloaded * 100 / total_size) as usize;
            if progress >= last_progress + 10 {
                tracing::info!(file = %filename, percent = progress, "download progress");
                last_progress = progress;
            }
        }
    }

    fs::rename(&partial, dest).map_err(|e| {
        StudioError::model_download_failed(format!(
            "Failed to move {} into place: {}",
            dest.display(),
            e
        ))
    })?;

    let size_mb = downloaded as f64 / (1024.0 * 1024.0);
    tracing::info!(file = %filename, size_mb, "download complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::loader::REQUIRED_MODEL_FILES;

    #[test]
    fn small_urls_cover_required_files() {
        let urls = model_urls(ModelPreset::Small).unwrap();
        for file in REQUIRED_MODEL_FILES {
            let has_url = urls.iter().any(|(name, _)| name == file);
            assert!(has_url, "Missing URL for required file: {}", file);
        }
    }

    #[test]
    fn only_small_is_downloadable() {
        assert!(model_urls(ModelPreset::Melody).is_none());
        assert!(model_urls(ModelPreset::Medium).is_none());
        assert!(model_urls(ModelPreset::Large).is_none());
    }

    #[test]
    fn present_files_need_no_download() {
        let dir = tempfile::tempdir().unwrap();
        for file in REQUIRED_MODEL_FILES {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        assert!(ensure_models(dir.path(), ModelPreset::Large).is_ok());
    }

    #[test]
    fn missing_export_without_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_models(&dir.path().join("musicgen-large"), ModelPreset::Large)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ModelNotFound);
        assert!(err.message.contains("facebook/musicgen-large"));
    }
}
