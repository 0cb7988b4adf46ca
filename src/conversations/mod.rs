//! Conversation records, the in-memory book and their persistence.

pub mod book;
pub mod store;
pub mod types;

pub use book::ConversationBook;
pub use store::{SqliteStateStore, StateStore, StoreError, StoreFuture, StoreResult};
pub use types::{
    Conversation, ConversationId, ConversationMap, ConversationMeta, GenerationOptions, Message,
    PLACEHOLDER_TITLE, Role, Transcript,
};
