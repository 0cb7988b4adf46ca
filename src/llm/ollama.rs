//! Async Ollama client: model listing, one-shot generation and streaming chat.
//!
//! The base URL is passed per call because it is a user setting that can
//! change while the client is alive.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::error::{LlmError, LlmResult};
use super::stream::ChatStream;
use crate::conversations::Message;

/// Connection timeout for model server requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for non-streaming requests (model listing, title generation).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Boxed future type for backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sampling parameters sent in the `options` object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Top-K cutoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,
    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Fixed seed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Body of `POST /api/chat`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model name.
    pub model: String,
    /// Full message list, system prompt first.
    pub messages: Vec<Message>,
    /// Always true for this client.
    pub stream: bool,
    /// Sampling overrides, omitted entirely when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SamplingOptions>,
}

impl ChatRequest {
    /// Build a streaming chat request.
    #[must_use]
    pub fn streaming(
        model: impl Into<String>,
        messages: Vec<Message>,
        options: Option<SamplingOptions>,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            options,
        }
    }
}

/// Body of `POST /api/generate`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerateRequest {
    /// Model name.
    pub model: String,
    /// Prompt text.
    pub prompt: String,
    /// Always false for this client.
    pub stream: bool,
    /// Sampling overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<SamplingOptions>,
}

impl GenerateRequest {
    /// Build a non-streaming generation request.
    #[must_use]
    pub fn one_shot(
        model: impl Into<String>,
        prompt: impl Into<String>,
        options: Option<SamplingOptions>,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            options,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// A model installed on the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name as accepted by the chat endpoint.
    pub name: String,
}

/// Operations the orchestrator needs from a model server.
pub trait ModelBackend: Send + Sync {
    /// List installed models.
    fn list_models<'a>(&'a self, base_url: &'a str) -> BackendFuture<'a, LlmResult<Vec<ModelInfo>>>;

    /// Run a non-streaming generation and return the response text.
    fn generate<'a>(
        &'a self,
        base_url: &'a str,
        request: GenerateRequest,
    ) -> BackendFuture<'a, LlmResult<String>>;

    /// Start a streaming chat. Fails before any event on a non-success status.
    fn chat_stream<'a>(
        &'a self,
        base_url: &'a str,
        request: ChatRequest,
    ) -> BackendFuture<'a, LlmResult<ChatStream>>;
}

/// HTTP client for an Ollama server.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    client: Client,
}

impl OllamaClient {
    /// Create a client with default timeouts.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new_default() -> LlmResult<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_models(&self, base_url: &str) -> LlmResult<Vec<ModelInfo>> {
        let url = endpoint(base_url, "api/tags");
        let response = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::HttpStatus(status.as_u16()));
        }

        let tags = response.json::<TagsResponse>().await?;
        tracing::debug!("Ollama at {base_url} lists {} models", tags.models.len());
        Ok(tags.models)
    }

    async fn post_generate(&self, base_url: &str, request: GenerateRequest) -> LlmResult<String> {
        let url = endpoint(base_url, "api/generate");
        let response = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::HttpStatus(status.as_u16()));
        }

        response
            .json::<GenerateResponse>()
            .await?
            .response
            .ok_or_else(|| LlmError::Malformed("missing `response` field".to_string()))
    }

    async fn post_chat(&self, base_url: &str, request: ChatRequest) -> LlmResult<ChatStream> {
        let url = endpoint(base_url, "api/chat");
        tracing::debug!(
            "Starting chat stream: model={} messages={} options={}",
            request.model,
            request.messages.len(),
            request.options.is_some()
        );

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::HttpStatus(status.as_u16()));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(LlmError::from))
            .boxed();
        Ok(ChatStream::new(body))
    }
}

impl ModelBackend for OllamaClient {
    fn list_models<'a>(&'a self, base_url: &'a str) -> BackendFuture<'a, LlmResult<Vec<ModelInfo>>> {
        Box::pin(self.fetch_models(base_url))
    }

    fn generate<'a>(
        &'a self,
        base_url: &'a str,
        request: GenerateRequest,
    ) -> BackendFuture<'a, LlmResult<String>> {
        Box::pin(self.post_generate(base_url, request))
    }

    fn chat_stream<'a>(
        &'a self,
        base_url: &'a str,
        request: ChatRequest,
    ) -> BackendFuture<'a, LlmResult<ChatStream>> {
        Box::pin(self.post_chat(base_url, request))
    }
}

/// Join a base URL and an API path without doubling slashes.
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}
