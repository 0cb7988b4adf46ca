//! Model server client: Ollama HTTP API and the streaming chat decoder.

pub mod error;
pub mod ollama;
pub mod stream;

pub use error::{LlmError, LlmResult};
pub use ollama::{
    BackendFuture, ChatRequest, GenerateRequest, ModelBackend, ModelInfo, OllamaClient,
    SamplingOptions,
};
pub use stream::{ChatStream, NdjsonDecoder, StreamEvent};
