//! Types for conversation management.
//!
//! Records serialize with the same camelCase layout the browser client kept
//! in local storage, and every field is default-filled when absent so older
//! records keep loading as the schema grows.

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm::SamplingOptions;

/// Title given to a conversation until the first exchange names it.
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// All conversations keyed by identifier, in creation order.
pub type ConversationMap = BTreeMap<ConversationId, Conversation>;

/// Time-derived conversation identifier (Unix milliseconds at creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub i64);

impl ConversationId {
    /// Wrap a millisecond timestamp.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// The underlying millisecond value.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions prepended to every request.
    System,
    /// Text typed by the user.
    User,
    /// Text produced by the model.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single entry of a conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// Message text. Assistant messages may carry an HTML sources appendix.
    pub content: String,
}

impl Message {
    /// Build a message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Per-conversation sampling overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationOptions {
    /// When false, no sampling parameter is sent and the server defaults apply.
    #[serde(rename = "override")]
    pub override_defaults: bool,
    /// Sampling temperature.
    pub temperature: f32,
    /// Top-K cutoff; values `<= 0` are never sent.
    pub top_k: i32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Fixed seed; absent or `<= 0` lets the server randomize.
    pub seed: Option<i64>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            override_defaults: false,
            temperature: 0.8,
            top_k: 40,
            top_p: 0.9,
            seed: None,
        }
    }
}

impl GenerationOptions {
    /// Resolve the options actually transmitted with a chat request.
    ///
    /// Returns `None` when overrides are disabled; otherwise each field
    /// follows its own omission rule.
    #[must_use]
    pub fn to_sampling(&self) -> Option<SamplingOptions> {
        if !self.override_defaults {
            return None;
        }

        Some(SamplingOptions {
            temperature: Some(self.temperature),
            top_k: (self.top_k > 0).then_some(self.top_k),
            top_p: Some(self.top_p),
            seed: self.seed.filter(|seed| *seed > 0),
        })
    }
}

/// A persisted conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Conversation {
    /// Display title.
    pub title: String,
    /// Committed user/assistant exchanges, oldest first.
    pub history: Vec<Message>,
    /// System prompt sent ahead of the history.
    pub system_prompt: String,
    /// Whether submissions are augmented with web search results.
    #[serde(rename = "isWebSearchEnabled")]
    pub web_search_enabled: bool,
    /// Selected model; empty means the settings default.
    pub model: String,
    /// Sampling overrides.
    pub options: GenerationOptions,
}

impl Default for Conversation {
    fn default() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            history: Vec::new(),
            system_prompt: String::new(),
            web_search_enabled: false,
            model: String::new(),
            options: GenerationOptions::default(),
        }
    }
}

impl Conversation {
    /// Create an empty conversation bound to `model`.
    #[must_use]
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// True before the first exchange has been committed and named.
    #[must_use]
    pub fn is_untitled(&self) -> bool {
        self.history.is_empty() && self.title == PLACEHOLDER_TITLE
    }

    /// Model to use for requests, falling back to `default_model`.
    #[must_use]
    pub fn resolve_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        if self.model.is_empty() {
            default_model
        } else {
            &self.model
        }
    }
}

/// Snapshot of a conversation as shown to the user after switching to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Transcript {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// System prompt.
    pub system_prompt: String,
    /// Web search toggle.
    pub web_search_enabled: bool,
    /// Model that the next turn will use (may be empty).
    pub model: String,
    /// Committed messages.
    pub messages: Vec<Message>,
}

/// Sidebar entry for a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationMeta {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Number of committed messages.
    pub message_count: usize,
    /// Whether this is the active conversation.
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_defaults_fill_missing_fields() {
        let conversation: Conversation = serde_json::from_str("{}").unwrap_or_default();
        assert_eq!(conversation.title, PLACEHOLDER_TITLE);
        assert!(conversation.history.is_empty());
        assert!(!conversation.web_search_enabled);
        assert_eq!(conversation.options, GenerationOptions::default());
    }

    #[test]
    fn test_conversation_round_trip() {
        let mut conversation = Conversation::with_model("llama3");
        conversation.title = "Rust lifetimes".to_string();
        conversation.system_prompt = "Be terse.".to_string();
        conversation.web_search_enabled = true;
        conversation.options.override_defaults = true;
        conversation.options.seed = Some(7);
        conversation.history.push(Message::user("hi"));
        conversation.history.push(Message::assistant("hello"));

        let json = serde_json::to_string(&conversation).unwrap_or_default();
        let back: Conversation = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(back, conversation);
    }

    #[test]
    fn test_legacy_record_layout() {
        let json = r#"{
            "title": "Old chat",
            "history": [{"role": "user", "content": "q"}, {"role": "assistant", "content": "a"}],
            "systemPrompt": "sys",
            "isWebSearchEnabled": true,
            "model": "mistral",
            "options": {"override": true, "temperature": 0.5, "topK": 10, "topP": 0.7, "seed": null}
        }"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap_or_default();
        assert_eq!(conversation.title, "Old chat");
        assert_eq!(conversation.history.len(), 2);
        assert_eq!(conversation.history[1].role, Role::Assistant);
        assert!(conversation.web_search_enabled);
        assert!(conversation.options.override_defaults);
        assert_eq!(conversation.options.top_k, 10);
    }

    #[test]
    fn test_partial_options_are_default_filled() {
        let json = r#"{"options": {"override": true}}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap_or_default();
        assert!(conversation.options.override_defaults);
        assert_eq!(conversation.options.top_k, 40);
        assert!((conversation.options.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sampling_omitted_without_override() {
        let options = GenerationOptions {
            override_defaults: false,
            temperature: 1.5,
            top_k: 99,
            top_p: 0.1,
            seed: Some(42),
        };
        assert!(options.to_sampling().is_none());
    }

    #[test]
    fn test_sampling_thresholds() {
        let options = GenerationOptions {
            override_defaults: true,
            top_k: 0,
            seed: Some(-3),
            ..GenerationOptions::default()
        };
        let sampling = options.to_sampling().unwrap_or_default();
        assert_eq!(sampling.top_k, None);
        assert_eq!(sampling.seed, None);
        assert!(sampling.temperature.is_some());
        assert!(sampling.top_p.is_some());

        let json = serde_json::to_value(&sampling).unwrap_or_default();
        assert!(json.get("top_k").is_none());
        assert!(json.get("seed").is_none());
    }

    #[test]
    fn test_sampling_keeps_positive_values() {
        let options = GenerationOptions {
            override_defaults: true,
            top_k: 5,
            seed: Some(11),
            ..GenerationOptions::default()
        };
        let sampling = options.to_sampling().unwrap_or_default();
        assert_eq!(sampling.top_k, Some(5));
        assert_eq!(sampling.seed, Some(11));
    }

    #[test]
    fn test_resolve_model_falls_back_to_default() {
        let conversation = Conversation::default();
        assert_eq!(conversation.resolve_model("llama3"), "llama3");
        let pinned = Conversation::with_model("mistral");
        assert_eq!(pinned.resolve_model("llama3"), "mistral");
    }

    #[test]
    fn test_conversation_id_parse_and_display() {
        let id: ConversationId = "1712345678901".parse().unwrap_or(ConversationId(0));
        assert_eq!(id.as_millis(), 1_712_345_678_901);
        assert_eq!(id.to_string(), "1712345678901");
    }
}
