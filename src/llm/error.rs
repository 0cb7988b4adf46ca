//! Error types for the model server client.

use thiserror::Error;

/// Errors produced while talking to the model server.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("ollama http status not ok: {0}")]
    HttpStatus(u16),
    /// The server reported an error inside the response stream.
    #[error("ollama error: {0}")]
    Upstream(String),
    /// The response could not be decoded.
    #[error("ollama response malformed: {0}")]
    Malformed(String),
}

/// Result type for model server operations.
pub type LlmResult<T> = Result<T, LlmError>;
