//! JSON-RPC server over TCP.
//!
//! Each connection carries line-delimited JSON-RPC 2.0 messages. Requests
//! on a connection are handled concurrently so that `interrupt` can reach
//! the server while a `predict` is still running; everything written back
//! goes through one per-connection writer task.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use crate::generation::{CancellationToken, Orchestrator};

use super::methods::handle_request;
use super::types::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, JSONRPC_VERSION,
};

/// Lines queued for the connection's writer task.
pub type Outgoing = mpsc::UnboundedSender<String>;

/// State shared across all connections and request handlers.
pub struct ServerState {
    /// One prediction at a time.
    pub orchestrator: Arc<Mutex<Orchestrator>>,
    /// Clone of the orchestrator's token; interrupting never takes the lock.
    pub cancel: CancellationToken,
    /// Session directory served by `fetch`; readable without the lock.
    pub storage_root: PathBuf,
    shutdown: watch::Sender<bool>,
}

impl ServerState {
    /// Creates new server state around the session's orchestrator.
    pub fn new(orchestrator: Orchestrator) -> Self {
        let cancel = orchestrator.cancellation_token();
        let storage_root = orchestrator.storage().path().to_path_buf();
        let (shutdown, _) = watch::channel(false);
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            cancel,
            storage_root,
            shutdown,
        }
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Binds `addr` and serves until a `shutdown` request arrives.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Accepts connections on `listener` until shutdown.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> io::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(addr = %local, "JSON-RPC server listening");

    let mut shutdown = state.subscribe_shutdown();
    while !state.is_shutdown() {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                tracing::debug!(%peer, "client connected");
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state).await {
                        tracing::warn!(%peer, error = %e, "connection closed with error");
                    }
                    tracing::debug!(%peer, "client disconnected");
                });
            }
            _ = shutdown.changed() => {}
        }
    }

    tracing::info!("JSON-RPC server stopped");
    Ok(())
}

async fn handle_connection(stream: TcpStream, state: Arc<ServerState>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok::<_, io::Error>(())
    });

    let mut lines = BufReader::new(reader).lines();
    let mut shutdown = state.subscribe_shutdown();
    while !state.is_shutdown() {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.changed() => continue,
        };
        let Some(line) = line else { break };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let state = Arc::clone(&state);
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Some(response) = process_request(&line, &state, &tx).await {
                tx.send(response).ok();
            }
        });
    }

    // The writer finishes once every in-flight handler has dropped its sender.
    drop(tx);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
    }
}

/// Processes a single JSON-RPC request line.
///
/// Returns the serialized response, or `None` for notifications.
pub(crate) async fn process_request(
    line: &str,
    state: &ServerState,
    outgoing: &Outgoing,
) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            return Some(error_response(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            ))
        }
    };

    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            return Some(error_response(
                None,
                JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
            ))
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Some(error_response(
            request.id,
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        ));
    }

    tracing::debug!(method = %request.method, "handling request");
    let result = handle_request(&request.method, request.params, state, outgoing).await;

    let id = request.id?;
    match result {
        Ok(response) => {
            Some(serde_json::to_string(&JsonRpcResponse::new(id, response)).unwrap_or_default())
        }
        Err(error) => Some(error_response(Some(id), error)),
    }
}

fn error_response(id: Option<RequestId>, error: JsonRpcError) -> String {
    serde_json::to_string(&JsonRpcErrorResponse::new(id, error)).unwrap_or_default()
}

/// Queues a JSON-RPC notification on a connection.
///
/// A closed connection drops the notification.
pub fn send_notification<T: serde::Serialize>(outgoing: &Outgoing, method: &'static str, params: T) {
    let notification = JsonRpcNotification::new(method, params);
    if let Ok(json) = serde_json::to_string(&notification) {
        outgoing.send(json).ok();
    }
}
