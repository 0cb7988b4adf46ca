//! Local HTTP fakes for integration tests.

#![allow(dead_code)]

use axum::Router;
use tokio::net::TcpListener;

/// Bind an ephemeral port, build the router with the base URL it will be
/// reachable at, serve it in the background and return that URL.
pub async fn spawn_server<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local address");
    };
    let base_url = format!("http://{addr}");
    let app = build(base_url.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    base_url
}

/// A base URL nothing listens on.
pub const REFUSED_URL: &str = "http://127.0.0.1:9";
