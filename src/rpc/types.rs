//! JSON-RPC types for the studio protocol.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, StudioError};
use crate::generation::{PredictOutput, Progress};
use crate::types::request::{
    DEFAULT_BASS_HZ, DEFAULT_CFG_COEF, DEFAULT_DURATION_SEC, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_K, DEFAULT_TOP_P, DEFAULT_TREBLE_HZ,
};
use crate::types::{AudioFormat, GenerationRequest, Melody, ModelPreset};

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper. A missing `id` makes it a notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error codes, one per [`ErrorKind`].
pub const VALIDATION_ERROR: i32 = -32010;
pub const MODEL_LOAD_ERROR: i32 = -32001;
pub const GENERATION_ERROR: i32 = -32003;
pub const INTERRUPTED_ERROR: i32 = -32020;

impl JsonRpcError {
    fn plain(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::plain(-32700, message)
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::plain(-32600, message)
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::plain(-32601, format!("Method not found: {}", method))
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::plain(-32602, message)
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::plain(-32603, message)
    }
}

impl From<&StudioError> for JsonRpcError {
    fn from(err: &StudioError) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => VALIDATION_ERROR,
            ErrorKind::ModelLoad => MODEL_LOAD_ERROR,
            ErrorKind::Generation => GENERATION_ERROR,
            ErrorKind::Interrupted => INTERRUPTED_ERROR,
        };
        Self {
            code,
            message: err.message.clone(),
            data: Some(JsonRpcErrorData {
                error_code: err.code.as_str().to_string(),
                details: Some(err.code.recovery_hint().to_string()),
            }),
        }
    }
}

impl From<StudioError> for JsonRpcError {
    fn from(err: StudioError) -> Self {
        Self::from(&err)
    }
}

// ============================================================================
// predict
// ============================================================================

/// Parameters of a `predict` call, named after the interface controls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictParams {
    pub model: String,
    pub text: Option<String>,
    pub melody: Option<Melody>,
    pub duration: f32,
    pub topk: f64,
    pub topp: f32,
    pub temperature: f32,
    pub cfg_coef: f32,
    pub treble: f32,
    pub bass: f32,
}

impl Default for PredictParams {
    fn default() -> Self {
        Self {
            model: ModelPreset::DEFAULT.as_str().to_string(),
            text: None,
            melody: None,
            duration: DEFAULT_DURATION_SEC,
            topk: DEFAULT_TOP_K,
            topp: DEFAULT_TOP_P,
            temperature: DEFAULT_TEMPERATURE,
            cfg_coef: DEFAULT_CFG_COEF,
            treble: DEFAULT_TREBLE_HZ,
            bass: DEFAULT_BASS_HZ,
        }
    }
}

impl From<PredictParams> for GenerationRequest {
    fn from(params: PredictParams) -> Self {
        GenerationRequest {
            model: params.model,
            prompt: params.text,
            melody: params.melody,
            duration_sec: params.duration,
            top_k: params.topk,
            top_p: params.topp,
            temperature: params.temperature,
            cfg_coef: params.cfg_coef,
            treble_hz: params.treble,
            bass_hz: params.bass,
        }
    }
}

/// Result of a `predict` call: the video slot and the audio slot.
#[derive(Debug, Serialize)]
pub struct PredictResult {
    pub video: String,
    pub audio: String,
    pub format: AudioFormat,
}

impl From<PredictOutput> for PredictResult {
    fn from((video, audio): PredictOutput) -> Self {
        Self {
            video: video.path.to_string_lossy().to_string(),
            audio: audio.path.to_string_lossy().to_string(),
            format: audio.format,
        }
    }
}

// ============================================================================
// fetch
// ============================================================================

/// Parameters of a `fetch` call.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchParams {
    /// A path previously returned by `predict`.
    pub path: String,
}

/// Result of a `fetch` call: the file contents, base64 encoded.
#[derive(Debug, Serialize)]
pub struct FetchResult {
    pub path: String,
    pub format: AudioFormat,
    pub data: String,
}

// ============================================================================
// interface
// ============================================================================

/// One input control of the interface.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputControl {
    Text {
        name: &'static str,
        label: &'static str,
    },
    Audio {
        name: &'static str,
        label: &'static str,
        optional: bool,
        info: &'static str,
    },
    Choice {
        name: &'static str,
        label: &'static str,
        choices: Vec<&'static str>,
        default: &'static str,
    },
    Slider {
        name: &'static str,
        label: &'static str,
        minimum: f32,
        maximum: f32,
        default: f32,
    },
    Number {
        name: &'static str,
        label: &'static str,
        default: f32,
    },
}

/// One output slot of the interface.
#[derive(Debug, Clone, Serialize)]
pub struct OutputSlot {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: &'static str,
}

/// Result of an `interface` call.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceDescription {
    pub title: &'static str,
    pub inputs: Vec<InputControl>,
    pub outputs: Vec<OutputSlot>,
}

// ============================================================================
// Notifications
// ============================================================================

/// A JSON-RPC notification (no id field).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<T: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: T,
}

impl<T: Serialize> JsonRpcNotification<T> {
    pub fn new(method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Sent after every generation step.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationProgressParams {
    /// Tokens generated so far, never decreasing.
    pub generated: usize,
    pub total: usize,
}

impl From<Progress> for GenerationProgressParams {
    fn from(progress: Progress) -> Self {
        Self {
            generated: progress.generated,
            total: progress.total,
        }
    }
}
