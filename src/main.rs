//! musicgen-studio: MusicGen generation service.
//!
//! Loads configuration from the environment, prepares the session and
//! serves the JSON-RPC interface until a `shutdown` request arrives.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use musicgen_studio::audio::{AudioPostProcessor, SessionStorage};
use musicgen_studio::cli::Cli;
use musicgen_studio::config::StudioConfig;
use musicgen_studio::generation::{CancellationToken, Orchestrator};
use musicgen_studio::models::{ModelHandle, OnnxLoader};
use musicgen_studio::rpc::{run_server, ServerState};

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    let config = StudioConfig::from_env();
    if let Some(problem) = config.validate() {
        anyhow::bail!("invalid configuration: {}", problem);
    }

    let model_root = config.effective_model_path();
    tracing::info!(
        model_root = %model_root.display(),
        tone_mapping = %config.tone_mapping,
        threads = ?config.threads,
        "starting musicgen-studio"
    );

    let models = ModelHandle::new(Box::new(OnnxLoader::new(model_root, config.threads)));
    let storage = SessionStorage::new(&config.effective_output_dir())
        .context("failed to prepare session storage")?;
    let orchestrator = Orchestrator::new(
        models,
        AudioPostProcessor::new(config.tone_mapping),
        storage,
        CancellationToken::new(),
    );
    let state = Arc::new(ServerState::new(orchestrator));

    let addr = cli.bind_addr(config.port);
    if cli.share {
        tracing::warn!(%addr, "--share given, listening on all interfaces");
    }

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime
        .block_on(run_server(addr, state))
        .with_context(|| format!("server on {} failed", addr))?;

    Ok(())
}
