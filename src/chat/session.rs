//! Conversation and settings management on top of the orchestrator.
//!
//! Every mutation is persisted before the call returns.

use chrono::Utc;

use super::error::{ChatError, ChatResult};
use super::orchestrator::ChatOrchestrator;
use crate::conversations::{
    Conversation, ConversationId, ConversationMeta, GenerationOptions, Transcript,
};
use crate::llm::ModelInfo;
use crate::settings::Settings;

impl ChatOrchestrator {
    /// Load persisted settings and conversations, creating a first
    /// conversation when none exist. Returns the active transcript.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub async fn bootstrap(&self) -> ChatResult<Transcript> {
        let settings = self.store.load_settings().await?.normalized();
        let conversations = self.store.load_conversations().await?;
        tracing::info!("Loaded {} conversations", conversations.len());

        let mut state = self.state.write().await;
        state.settings = settings;
        state.book = crate::conversations::ConversationBook::from_map(conversations);
        if state.book.is_empty() {
            let default_model = state.settings.default_model.clone();
            state.book.create(now_millis(), &default_model);
            self.store
                .save_conversations(state.book.conversations())
                .await?;
        }

        let id = state.book.active_id().ok_or(ChatError::NoActiveConversation)?;
        state
            .book
            .transcript(id, &state.settings.default_model)
            .ok_or(ChatError::ConversationNotFound(id))
    }

    /// Current settings.
    pub async fn settings(&self) -> Settings {
        self.state.read().await.settings.clone()
    }

    /// Replace the settings and persist them. Returns the normalized copy.
    ///
    /// # Errors
    /// Returns an error if the settings cannot be saved.
    pub async fn update_settings(&self, settings: Settings) -> ChatResult<Settings> {
        let settings = settings.normalized();
        let mut state = self.state.write().await;
        self.store.save_settings(&settings).await?;
        state.settings = settings.clone();
        tracing::debug!("Settings updated: ollama_url={}", settings.ollama_url);
        Ok(settings)
    }

    /// List models on the configured server. When no default model is set,
    /// the first listed model becomes the default.
    ///
    /// # Errors
    /// Returns a transport error naming the server URL when it cannot be
    /// reached, or a store error if adopting a default fails to persist.
    pub async fn refresh_models(&self) -> ChatResult<Vec<ModelInfo>> {
        let base_url = self.state.read().await.settings.ollama_url.clone();
        let models = match self.models.list_models(&base_url).await {
            Ok(models) => models,
            Err(e) => {
                tracing::error!("Error fetching models from {base_url}: {e}");
                return Err(ChatError::Transport(format!(
                    "Could not connect to Ollama at {base_url}."
                )));
            }
        };

        if let Some(first) = models.first() {
            let mut state = self.state.write().await;
            if state.settings.default_model.is_empty() {
                let mut settings = state.settings.clone();
                settings.default_model.clone_from(&first.name);
                self.store.save_settings(&settings).await?;
                tracing::info!("Default model set to {}", settings.default_model);
                state.settings = settings;
            }
        }

        Ok(models)
    }

    /// Whether a model server answers at `url`.
    pub async fn test_connection(&self, url: &str) -> bool {
        let url = url.trim().trim_end_matches('/');
        match self.models.list_models(url).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Connection test to {url} failed: {e}");
                false
            }
        }
    }

    /// Sidebar listing.
    pub async fn list_conversations(&self) -> Vec<ConversationMeta> {
        self.state.read().await.book.list()
    }

    /// Identifier of the active conversation.
    pub async fn active_id(&self) -> Option<ConversationId> {
        self.state.read().await.book.active_id()
    }

    /// Snapshot of a conversation.
    ///
    /// # Errors
    /// Returns an error for unknown ids.
    pub async fn transcript(&self, id: ConversationId) -> ChatResult<Transcript> {
        let state = self.state.read().await;
        state
            .book
            .transcript(id, &state.settings.default_model)
            .ok_or(ChatError::ConversationNotFound(id))
    }

    /// Create and activate an empty conversation bound to the default model.
    ///
    /// # Errors
    /// Returns an error if the conversations cannot be saved.
    pub async fn new_chat(&self) -> ChatResult<ConversationId> {
        let mut state = self.state.write().await;
        let default_model = state.settings.default_model.clone();
        let id = state.book.create(now_millis(), &default_model);
        self.store
            .save_conversations(state.book.conversations())
            .await?;
        tracing::info!("Created conversation {id}");
        Ok(id)
    }

    /// Activate a conversation and return its transcript.
    ///
    /// # Errors
    /// Returns an error for unknown ids.
    pub async fn switch_chat(&self, id: ConversationId) -> ChatResult<Transcript> {
        let mut state = self.state.write().await;
        if !state.book.activate(id) {
            return Err(ChatError::ConversationNotFound(id));
        }
        state
            .book
            .transcript(id, &state.settings.default_model)
            .ok_or(ChatError::ConversationNotFound(id))
    }

    /// Delete a conversation. Returns the id that is active afterwards; a
    /// fresh conversation is created when the last one is deleted.
    ///
    /// # Errors
    /// Fails for unknown ids, while a turn runs on `id`, or when saving fails.
    pub async fn delete_chat(&self, id: ConversationId) -> ChatResult<ConversationId> {
        if self.is_busy(id) {
            return Err(ChatError::TurnInFlight(id));
        }

        let mut state = self.state.write().await;
        if state.book.remove(id).is_none() {
            return Err(ChatError::ConversationNotFound(id));
        }
        if state.book.is_empty() {
            let default_model = state.settings.default_model.clone();
            state.book.create(now_millis(), &default_model);
        }
        let active = state.book.active_id().ok_or(ChatError::NoActiveConversation)?;
        self.store
            .save_conversations(state.book.conversations())
            .await?;
        tracing::info!("Deleted conversation {id}");
        Ok(active)
    }

    /// Rename a conversation. Blank or unchanged titles are ignored and
    /// return false.
    ///
    /// # Errors
    /// Fails for unknown ids or when saving fails.
    pub async fn rename_chat(&self, id: ConversationId, title: &str) -> ChatResult<bool> {
        let mut state = self.state.write().await;
        if state.book.get(id).is_none() {
            return Err(ChatError::ConversationNotFound(id));
        }
        if !state.book.rename(id, title) {
            return Ok(false);
        }
        self.store
            .save_conversations(state.book.conversations())
            .await?;
        Ok(true)
    }

    /// Select the model for a conversation.
    ///
    /// # Errors
    /// Fails for unknown ids or when saving fails.
    pub async fn set_model(&self, id: ConversationId, model: &str) -> ChatResult<()> {
        let model = model.trim().to_string();
        self.update_conversation(id, move |c| c.model = model).await
    }

    /// Set the system prompt of a conversation.
    ///
    /// # Errors
    /// Fails for unknown ids or when saving fails.
    pub async fn set_system_prompt(&self, id: ConversationId, prompt: &str) -> ChatResult<()> {
        let prompt = prompt.to_string();
        self.update_conversation(id, move |c| c.system_prompt = prompt)
            .await
    }

    /// Toggle web search for a conversation.
    ///
    /// # Errors
    /// Fails for unknown ids or when saving fails.
    pub async fn set_web_search(&self, id: ConversationId, enabled: bool) -> ChatResult<()> {
        self.update_conversation(id, move |c| c.web_search_enabled = enabled)
            .await
    }

    /// Replace the sampling options of a conversation.
    ///
    /// # Errors
    /// Fails for unknown ids or when saving fails.
    pub async fn set_options(&self, id: ConversationId, options: GenerationOptions) -> ChatResult<()> {
        self.update_conversation(id, move |c| c.options = options)
            .await
    }

    async fn update_conversation<F>(&self, id: ConversationId, apply: F) -> ChatResult<()>
    where
        F: FnOnce(&mut Conversation) + Send,
    {
        let mut state = self.state.write().await;
        let conversation = state
            .book
            .get_mut(id)
            .ok_or(ChatError::ConversationNotFound(id))?;
        apply(conversation);
        self.store
            .save_conversations(state.book.conversations())
            .await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
