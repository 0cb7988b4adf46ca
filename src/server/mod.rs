//! Local search proxy for the browser front-end.
//!
//! Routes:
//! - `POST /api/search`
//! - `GET /health`
//! - everything else from the static directory

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::ProxyState;

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use crate::config::DEFAULT_PORT;

/// Boxed error returned by the serving functions.
pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Bind `127.0.0.1:port` and serve until `shutdown` resolves.
///
/// # Errors
/// Fails when the port cannot be bound or the server stops abnormally.
pub async fn run_server_with_shutdown(
    state: Arc<ProxyState>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
    tracing::info!(port, "search proxy listening on http://localhost:{port}");
    serve(listener, state, shutdown).await
}

/// Serve the proxy on a listener the caller already bound.
///
/// # Errors
/// Fails when the server stops abnormally.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ProxyState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let app = create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
