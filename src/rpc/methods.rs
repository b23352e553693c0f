//! JSON-RPC method handlers.

use std::path::Path;
use std::sync::{Arc, PoisonError};

use base64::Engine as _;
use serde::de::DeserializeOwned;

use crate::audio::resolve_within;
use crate::error::StudioError;
use crate::generation::Progress;
use crate::types::request::{
    DEFAULT_BASS_HZ, DEFAULT_CFG_COEF, DEFAULT_DURATION_SEC, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K, DEFAULT_TOP_P, DEFAULT_TREBLE_HZ, MAX_DURATION_SEC,
};
use crate::types::{AudioFormat, GenerationRequest, ModelPreset};

use super::server::{send_notification, Outgoing, ServerState};
use super::types::{
    FetchParams, FetchResult, GenerationProgressParams, InputControl, InterfaceDescription,
    JsonRpcError, OutputSlot, PredictParams, PredictResult,
};

/// Handles a JSON-RPC method call.
pub async fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &ServerState,
    outgoing: &Outgoing,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        "predict" => handle_predict(params, state, outgoing).await,
        "interrupt" => handle_interrupt(state),
        "fetch" => handle_fetch(params, state).await,
        "interface" => to_value(describe_interface()),
        "ping" => handle_ping(),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

/// Handles the ping method for health checks.
fn handle_ping() -> Result<serde_json::Value, JsonRpcError> {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Handles the shutdown method.
fn handle_shutdown(state: &ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

/// Sets the cancellation flag. The running prediction stops at its next
/// progress report.
fn handle_interrupt(state: &ServerState) -> Result<serde_json::Value, JsonRpcError> {
    state.cancel.cancel();
    tracing::info!("interrupt requested");
    Ok(serde_json::json!({ "status": "interrupting" }))
}

/// Runs a prediction on the blocking pool, streaming progress on `outgoing`.
async fn handle_predict(
    params: serde_json::Value,
    state: &ServerState,
    outgoing: &Outgoing,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: PredictParams = parse_params(params)?;
    let request = GenerationRequest::from(params);

    let orchestrator = Arc::clone(&state.orchestrator);
    let notifier = outgoing.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let mut orchestrator = orchestrator.lock().unwrap_or_else(PoisonError::into_inner);
        orchestrator.predict(&request, &mut |progress: Progress| {
            send_notification(
                &notifier,
                "generation_progress",
                GenerationProgressParams::from(progress),
            );
        })
    })
    .await
    .map_err(|e| JsonRpcError::internal_error(format!("Generation task failed: {}", e)))?;

    match outcome {
        Ok(output) => to_value(PredictResult::from(output)),
        Err(e) => {
            tracing::warn!(code = %e.code, error = %e, "prediction failed");
            Err(JsonRpcError::from(&e))
        }
    }
}

/// Returns the bytes of a rendered file so remote clients can play it.
///
/// Only files inside the session directory are served.
async fn handle_fetch(
    params: serde_json::Value,
    state: &ServerState,
) -> Result<serde_json::Value, JsonRpcError> {
    let params: FetchParams = parse_params(params)?;
    let Some(path) = resolve_within(&state.storage_root, Path::new(&params.path)) else {
        return Err(JsonRpcError::invalid_params(format!(
            "Not a rendered file of this session: {}",
            params.path
        )));
    };

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        JsonRpcError::from(StudioError::audio_io(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        )))
    })?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "serving rendered file");

    to_value(FetchResult {
        path: params.path,
        format: AudioFormat::Wav,
        data: base64::engine::general_purpose::STANDARD.encode(&bytes),
    })
}

/// Describes the controls a client should render.
pub fn describe_interface() -> InterfaceDescription {
    InterfaceDescription {
        title: "MusicGen",
        inputs: vec![
            InputControl::Choice {
                name: "model",
                label: "Model",
                choices: ModelPreset::ALL.iter().map(|p| p.as_str()).collect(),
                default: ModelPreset::DEFAULT.as_str(),
            },
            InputControl::Text {
                name: "text",
                label: "Input Text",
            },
            InputControl::Audio {
                name: "melody",
                label: "Condition on a melody (optional)",
                optional: true,
                info: "Requires a model with a chroma conditioner",
            },
            InputControl::Slider {
                name: "duration",
                label: "Duration",
                minimum: 1.0,
                maximum: MAX_DURATION_SEC,
                default: DEFAULT_DURATION_SEC,
            },
            InputControl::Number {
                name: "topk",
                label: "Top-k",
                default: DEFAULT_TOP_K as f32,
            },
            InputControl::Number {
                name: "topp",
                label: "Top-p",
                default: DEFAULT_TOP_P,
            },
            InputControl::Number {
                name: "temperature",
                label: "Temperature",
                default: DEFAULT_TEMPERATURE,
            },
            InputControl::Number {
                name: "cfg_coef",
                label: "Classifier Free Guidance",
                default: DEFAULT_CFG_COEF,
            },
            InputControl::Slider {
                name: "treble",
                label: "Treble",
                minimum: 1000.0,
                maximum: 10000.0,
                default: DEFAULT_TREBLE_HZ,
            },
            InputControl::Slider {
                name: "bass",
                label: "Bass",
                minimum: 20.0,
                maximum: 500.0,
                default: DEFAULT_BASS_HZ,
            },
        ],
        outputs: vec![
            OutputSlot {
                name: "video",
                label: "Generated Music",
                kind: "video",
            },
            OutputSlot {
                name: "audio",
                label: "Generated Music (wav)",
                kind: "audio",
            },
        ],
    }
}

/// Deserializes method params; absent params count as an empty object.
fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, JsonRpcError> {
    let params = if params.is_null() {
        serde_json::json!({})
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to encode result: {}", e)))
}
