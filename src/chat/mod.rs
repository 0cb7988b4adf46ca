//! Chat orchestration.
//!
//! A turn goes through `Idle → (SearchPending) → Prompting → Streaming →
//! Committed`, publishing [`TurnEvent`]s on an unbounded channel so a
//! front-end can render deltas as they arrive. Conversation and settings
//! management live on the same [`ChatOrchestrator`].

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod prompt;
pub mod session;

pub use error::{ChatError, ChatResult, ErrorKind};
pub use events::{EventSender, Notice, NoticeLevel, TurnEvent, TurnOutcome, TurnPhase};
pub use orchestrator::{AppState, ChatOrchestrator, SharedState};
