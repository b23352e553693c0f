//! JSON-RPC presentation layer.
//!
//! Methods:
//! - `predict`: Generate music from the interface controls
//! - `interrupt`: Stop the running prediction
//! - `fetch`: Read back a rendered file as base64
//! - `interface`: Describe the controls and outputs
//! - `ping`: Health check
//! - `shutdown`: Graceful shutdown
//!
//! Notifications:
//! - `generation_progress`: Token progress of the running prediction

pub mod methods;
pub mod server;
pub mod types;

#[cfg(test)]
mod test_support;

pub use methods::describe_interface;
pub use server::{run_server, send_notification, serve, Outgoing, ServerState};
pub use types::{
    FetchParams, FetchResult, GenerationProgressParams, InterfaceDescription, JsonRpcError,
    JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, PredictParams,
    PredictResult, RequestId,
};
