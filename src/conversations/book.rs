//! In-memory conversation book: the map of conversations plus the active id.

use super::types::{
    Conversation, ConversationId, ConversationMap, ConversationMeta, Transcript,
};

/// Owns every conversation and tracks which one is active.
#[derive(Clone, Debug, Default)]
pub struct ConversationBook {
    conversations: ConversationMap,
    active: Option<ConversationId>,
    /// Highest id ever issued or loaded. Never lowered by `remove`.
    last_issued: Option<i64>,
}

impl ConversationBook {
    /// Build a book from persisted conversations; the first id becomes active.
    #[must_use]
    pub fn from_map(conversations: ConversationMap) -> Self {
        let active = conversations.keys().next().copied();
        let last_issued = conversations.keys().next_back().map(|id| id.as_millis());
        Self {
            conversations,
            active,
            last_issued,
        }
    }

    /// All conversations.
    #[must_use]
    pub const fn conversations(&self) -> &ConversationMap {
        &self.conversations
    }

    /// Number of conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// True when no conversation exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// Identifier of the active conversation.
    #[must_use]
    pub const fn active_id(&self) -> Option<ConversationId> {
        self.active
    }

    /// Borrow a conversation.
    #[must_use]
    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(&id)
    }

    /// Mutably borrow a conversation.
    pub fn get_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.get_mut(&id)
    }

    /// Create an empty conversation, make it active and return its id.
    ///
    /// Ids derive from `now_ms` and always move past every id this book has
    /// issued, deleted ones included.
    pub fn create(&mut self, now_ms: i64, default_model: &str) -> ConversationId {
        let millis = self
            .last_issued
            .map_or(now_ms, |last| now_ms.max(last.saturating_add(1)));
        self.last_issued = Some(millis);
        let id = ConversationId::from_millis(millis);

        self.conversations
            .insert(id, Conversation::with_model(default_model));
        self.active = Some(id);
        id
    }

    /// Make `id` the active conversation. Returns false for unknown ids.
    pub fn activate(&mut self, id: ConversationId) -> bool {
        if self.conversations.contains_key(&id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    /// Remove a conversation.
    ///
    /// When the active conversation is removed, the first remaining one is
    /// activated; if none remain the book has no active conversation and the
    /// caller is expected to create one.
    pub fn remove(&mut self, id: ConversationId) -> Option<Conversation> {
        let removed = self.conversations.remove(&id)?;
        if self.active == Some(id) {
            self.active = self.conversations.keys().next().copied();
        }
        Some(removed)
    }

    /// Rename a conversation. Blank or unchanged titles are ignored.
    ///
    /// Returns true when the title changed.
    pub fn rename(&mut self, id: ConversationId, title: &str) -> bool {
        let title = title.trim();
        match self.conversations.get_mut(&id) {
            Some(conversation) if !title.is_empty() && conversation.title != title => {
                conversation.title = title.to_string();
                true
            }
            _ => false,
        }
    }

    /// Snapshot a conversation for display.
    #[must_use]
    pub fn transcript(&self, id: ConversationId, default_model: &str) -> Option<Transcript> {
        let conversation = self.conversations.get(&id)?;
        Some(Transcript {
            id,
            title: conversation.title.clone(),
            system_prompt: conversation.system_prompt.clone(),
            web_search_enabled: conversation.web_search_enabled,
            model: conversation.resolve_model(default_model).to_string(),
            messages: conversation.history.clone(),
        })
    }

    /// Sidebar listing in id order.
    #[must_use]
    pub fn list(&self) -> Vec<ConversationMeta> {
        self.conversations
            .iter()
            .map(|(id, conversation)| ConversationMeta {
                id: *id,
                title: conversation.title.clone(),
                message_count: conversation.history.len(),
                active: self.active == Some(*id),
            })
            .collect()
    }
}
