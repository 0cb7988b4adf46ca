//! Error types for chat turns and conversation management.

use thiserror::Error;

use crate::conversations::{ConversationId, StoreError};
use crate::llm::LlmError;

/// Failure class, used by front-ends to decide how to present an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required user setting is missing. Reported before any network call.
    Config,
    /// A collaborator service answered with an error.
    Upstream,
    /// The connection failed.
    Transport,
    /// Local persistence failed.
    Storage,
    /// The request conflicts with the current application state.
    State,
}

/// Errors surfaced by the chat orchestrator.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or invalid user configuration.
    #[error("{0}")]
    Config(String),

    /// The model server reported an error.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The model server could not be reached or the stream broke.
    #[error("transport error: {0}")]
    Transport(String),

    /// Persisting state failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A turn is already running on this conversation.
    #[error("a turn is already in flight for conversation {0}")]
    TurnInFlight(ConversationId),

    /// No conversation with this id.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// The book has no active conversation.
    #[error("no active conversation")]
    NoActiveConversation,
}

impl ChatError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Store(_) => ErrorKind::Storage,
            Self::TurnInFlight(_) | Self::ConversationNotFound(_) | Self::NoActiveConversation => {
                ErrorKind::State
            }
        }
    }
}

impl From<LlmError> for ChatError {
    fn from(err: LlmError) -> Self {
        match err {
            // A non-success initial status counts as a transport failure.
            LlmError::Transport(_) | LlmError::HttpStatus(_) => Self::Transport(err.to_string()),
            LlmError::Upstream(_) | LlmError::Malformed(_) => Self::Upstream(err.to_string()),
        }
    }
}

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_classification() {
        assert_eq!(ChatError::from(LlmError::HttpStatus(500)).kind(), ErrorKind::Transport);
        assert_eq!(
            ChatError::from(LlmError::Upstream("model not found".to_string())).kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            ChatError::from(LlmError::Malformed("x".to_string())).kind(),
            ErrorKind::Upstream
        );
    }

    #[test]
    fn test_state_errors() {
        let id = ConversationId::from_millis(7);
        assert_eq!(ChatError::TurnInFlight(id).kind(), ErrorKind::State);
        assert_eq!(ChatError::NoActiveConversation.kind(), ErrorKind::State);
        assert_eq!(ChatError::Config("x".to_string()).kind(), ErrorKind::Config);
    }
}
