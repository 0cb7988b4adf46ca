//! Events published while a turn runs.

use tokio::sync::mpsc::UnboundedSender;

use crate::conversations::{ConversationId, Message};

/// Turn state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// Nothing running.
    Idle,
    /// Waiting for web search results.
    SearchPending,
    /// Title generation and request assembly.
    Prompting,
    /// Receiving deltas.
    Streaming,
    /// Both messages appended to history and persisted.
    Committed,
}

/// Severity of a transient notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress information.
    Info,
    /// Degraded but continuing.
    Warning,
    /// The turn was aborted.
    Error,
}

/// A transient, never-persisted message shown in the transcript.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Display text.
    pub text: String,
}

impl Notice {
    /// Informational notice.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    /// Warning notice.
    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
        }
    }

    /// Error notice.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Everything a renderer needs to follow a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    /// The turn moved to a new phase.
    Phase(TurnPhase),
    /// The literal user text was accepted.
    UserMessage(String),
    /// A transient notice.
    Notice(Notice),
    /// The conversation received a generated title.
    TitleChanged(String),
    /// A fragment of the assistant reply.
    Delta(String),
    /// The final assistant message, sources appendix included.
    Committed(Message),
}

/// How a submitted turn ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// The exchange was appended and persisted.
    Committed {
        /// Conversation the turn ran on.
        conversation: ConversationId,
        /// The committed assistant message.
        reply: Message,
    },
    /// The receiver went away mid-stream; nothing was committed.
    Abandoned,
}

/// Sending half handed to a turn.
pub type EventSender = UnboundedSender<TurnEvent>;
