//! Startup helpers shared by the binaries.

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::server::{self, ProxyState};

/// Install the tracing subscriber. `RUST_LOG` refines the INFO default.
///
/// Output goes to stderr so it never interleaves with a streamed reply.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Entry point of the `llama-tamer-server` binary.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting LlamaTamer search proxy");

    match serve_from_env() {
        Ok(()) => {
            tracing::info!("search proxy stopped");
            ExitCode::SUCCESS
        }
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn serve_from_env() -> Result<(), String> {
    let config = AppConfig::from_env().map_err(|e| format!("invalid configuration: {e}"))?;
    let state =
        ProxyState::from_config(&config).map_err(|e| format!("cannot build proxy state: {e}"))?;
    tracing::info!(dir = %config.static_dir.display(), "serving static files");

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("cannot start the async runtime: {e}"))?;
    runtime
        .block_on(server::run_server_with_shutdown(state, config.port, ctrl_c()))
        .map_err(|e| format!("server error: {e}"))
}

/// Resolves on Ctrl+C, or never when the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}
