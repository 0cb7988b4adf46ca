//! HTTP route handlers for the search proxy.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::services::ServeDir;

use crate::search::{SearchBundle, SearchError};

use super::state::ProxyState;

/// Create the router: health, search proxy and static files.
pub fn create_router(state: Arc<ProxyState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/health", get(health_check))
        .route("/api/search", post(web_search))
        .fallback_service(static_files)
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "llama-tamer",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Body of `POST /api/search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// The user's question.
    #[serde(default)]
    pub query: Option<String>,
    /// Brave Search subscription token.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// JSON error reply: `{"error": "..."}` with a non-2xx status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            missing_key if missing_key.is_config() => {
                Self::new(StatusCode::BAD_REQUEST, "Brave Search API key is required.")
            }
            SearchError::Upstream { status, message } => Self::new(
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message.unwrap_or_else(|| "Failed to call Brave Search API.".to_string()),
            ),
            other => {
                tracing::error!("Error during search and scraping: {other}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process request.")
            }
        }
    }
}

/// Handle web search requests.
async fn web_search(
    State(state): State<Arc<ProxyState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchBundle>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Rejected search body: {rejection}");
            SearchRequest::default()
        }
    };

    let query = request.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Query is required."));
    }
    let api_key = request.api_key.unwrap_or_default();
    if api_key.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Brave Search API key is required.",
        ));
    }

    let bundle = state.search.augment(&query, &api_key).await?;
    Ok(Json(bundle))
}
