//! Turn orchestration: search, title, streaming and commit.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::RwLock;

use super::error::{ChatError, ChatResult, ErrorKind};
use super::events::{EventSender, Notice, TurnEvent, TurnOutcome, TurnPhase};
use super::prompt::{assemble_messages, clean_title, title_options, title_prompt};
use crate::conversations::{ConversationBook, ConversationId, Message, StateStore};
use crate::llm::{ChatRequest, GenerateRequest, ModelBackend, StreamEvent};
use crate::search::{SearchBackend, SearchBundle, augmented_prompt, sources_appendix};
use crate::settings::Settings;

/// Shown when web search is on but no key is configured.
pub const MISSING_SEARCH_KEY: &str = "Brave Search API key is not set. Please add it in Settings.";

/// Shown when neither the conversation nor the settings name a model.
pub const NO_MODEL_SELECTED: &str = "No model selected. Pick a model or set a default model in Settings.";

/// Shown when the chat request or stream fails.
pub const CHAT_FAILED: &str = "Error: Failed to get response from Ollama.";

/// Shown when a finished turn cannot be persisted.
pub const SAVE_FAILED: &str = "Error: Failed to save the conversation.";

const SEARCH_STARTED: &str = "🔍 Performing web search...";
const SEARCH_COMPLETED: &str = "✅ Web search complete. Generating answer...";

/// Mutable application state: settings and every conversation.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    /// User settings.
    pub settings: Settings,
    /// Conversations and the active id.
    pub book: ConversationBook,
}

/// Shared handle to the application state.
pub type SharedState = Arc<RwLock<AppState>>;

/// Drives turns and conversation management against the injected backends.
///
/// Cloning is cheap and clones share state, so a front-end can run a turn
/// on a spawned task while it keeps handling commands.
#[derive(Clone)]
pub struct ChatOrchestrator {
    pub(super) state: SharedState,
    pub(super) store: Arc<dyn StateStore>,
    pub(super) models: Arc<dyn ModelBackend>,
    pub(super) search: Arc<dyn SearchBackend>,
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
}

impl ChatOrchestrator {
    /// Create an orchestrator with empty state. Call
    /// [`ChatOrchestrator::bootstrap`] to load persisted state.
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        models: Arc<dyn ModelBackend>,
        search: Arc<dyn SearchBackend>,
    ) -> Self {
        Self::with_state(store, models, search, AppState::default())
    }

    /// Create an orchestrator around existing state.
    #[must_use]
    pub fn with_state(
        store: Arc<dyn StateStore>,
        models: Arc<dyn ModelBackend>,
        search: Arc<dyn SearchBackend>,
        state: AppState,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            store,
            models,
            search,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Shared state handle.
    #[must_use]
    pub const fn state(&self) -> &SharedState {
        &self.state
    }

    /// Whether a turn is running on `id`.
    #[must_use]
    pub fn is_busy(&self, id: ConversationId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Submit on the active conversation.
    ///
    /// # Errors
    /// See [`ChatOrchestrator::submit`].
    pub async fn submit_active(&self, text: &str, events: &EventSender) -> ChatResult<TurnOutcome> {
        let id = self
            .state
            .read()
            .await
            .book
            .active_id()
            .ok_or(ChatError::NoActiveConversation)?;
        self.submit(id, text, events).await
    }

    /// Run one turn on conversation `id`, publishing progress on `events`.
    ///
    /// Blank text is ignored. Search failures degrade to an unaugmented
    /// prompt; title failures are logged only. Any other failure emits one
    /// error notice and leaves the history untouched.
    ///
    /// # Errors
    /// Returns [`ChatError::TurnInFlight`] when `id` already has a running
    /// turn, a config error when the model or search key is missing, and a
    /// transport or upstream error when the chat request fails.
    pub async fn submit(
        &self,
        id: ConversationId,
        text: &str,
        events: &EventSender,
    ) -> ChatResult<TurnOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let _guard = TurnGuard::acquire(&self.in_flight, id)?;

        let (settings, conversation) = {
            let state = self.state.read().await;
            let conversation = state
                .book
                .get(id)
                .cloned()
                .ok_or(ChatError::ConversationNotFound(id))?;
            (state.settings.clone(), conversation)
        };

        let model = conversation.resolve_model(&settings.default_model).to_string();
        if model.is_empty() {
            return Err(abort(events, ChatError::Config(NO_MODEL_SELECTED.to_string())));
        }
        if conversation.web_search_enabled && !settings.has_search_key() {
            return Err(abort(events, ChatError::Config(MISSING_SEARCH_KEY.to_string())));
        }

        tracing::info!("Turn started on conversation {id} with model {model}");
        emit(events, TurnEvent::UserMessage(text.to_string()));

        let mut outgoing = text.to_string();
        let mut bundle: Option<SearchBundle> = None;
        if conversation.web_search_enabled {
            emit(events, TurnEvent::Phase(TurnPhase::SearchPending));
            emit(events, TurnEvent::Notice(Notice::info(SEARCH_STARTED)));
            match self.search.augment(text, &settings.brave_api_key).await {
                Ok(found) => {
                    outgoing = augmented_prompt(&found, text);
                    emit(events, TurnEvent::Notice(Notice::info(SEARCH_COMPLETED)));
                    bundle = Some(found);
                }
                Err(e) => {
                    tracing::warn!("Web search failed, answering without context: {e}");
                    emit(
                        events,
                        TurnEvent::Notice(Notice::warning(format!(
                            "❌ Web search failed: {e}. Answering without web context."
                        ))),
                    );
                }
            }
        }

        emit(events, TurnEvent::Phase(TurnPhase::Prompting));
        if conversation.is_untitled() {
            self.generate_title(id, &settings.ollama_url, &model, text, events)
                .await;
        }

        let request = ChatRequest::streaming(
            model.clone(),
            assemble_messages(&conversation.system_prompt, &conversation.history, &outgoing),
            conversation.options.to_sampling(),
        );
        let mut stream = match self.models.chat_stream(&settings.ollama_url, request).await {
            Ok(stream) => stream,
            Err(e) => return Err(abort(events, e.into())),
        };

        emit(events, TurnEvent::Phase(TurnPhase::Streaming));
        let mut reply = String::new();
        loop {
            match stream.next_event().await {
                Ok(Some(StreamEvent::Delta(delta))) => {
                    reply.push_str(&delta);
                    if events.send(TurnEvent::Delta(delta)).is_err() {
                        tracing::info!("Turn on conversation {id} abandoned mid-stream");
                        return Ok(TurnOutcome::Abandoned);
                    }
                }
                Ok(Some(StreamEvent::Done) | None) => break,
                Err(e) => return Err(abort(events, e.into())),
            }
        }

        if let Some(bundle) = &bundle {
            reply.push_str(&sources_appendix(bundle));
        }
        let assistant = Message::assistant(reply);

        if let Err(e) = self.commit(id, model, text, &assistant).await {
            return Err(abort(events, e));
        }

        tracing::info!("Turn committed on conversation {id}");
        emit(events, TurnEvent::Committed(assistant.clone()));
        emit(events, TurnEvent::Phase(TurnPhase::Committed));

        Ok(TurnOutcome::Committed {
            conversation: id,
            reply: assistant,
        })
    }

    /// Append the user/assistant pair and persist it. On a failed save the
    /// in-memory conversation is rolled back to its previous state.
    async fn commit(
        &self,
        id: ConversationId,
        model: String,
        text: &str,
        assistant: &Message,
    ) -> ChatResult<()> {
        let mut state = self.state.write().await;
        let conversation = state
            .book
            .get_mut(id)
            .ok_or(ChatError::ConversationNotFound(id))?;
        let previous_model = std::mem::replace(&mut conversation.model, model);
        let kept = conversation.history.len();
        conversation.history.push(Message::user(text));
        conversation.history.push(assistant.clone());

        // Saved under the lock so snapshots reach the store in order.
        if let Err(e) = self.store.save_conversations(state.book.conversations()).await {
            if let Some(restored) = state.book.get_mut(id) {
                restored.history.truncate(kept);
                restored.model = previous_model;
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn generate_title(
        &self,
        id: ConversationId,
        base_url: &str,
        model: &str,
        first_message: &str,
        events: &EventSender,
    ) {
        let request = GenerateRequest::one_shot(model, title_prompt(first_message), Some(title_options()));
        let raw = match self.models.generate(base_url, request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Title generation failed for conversation {id}: {e}");
                return;
            }
        };
        let Some(title) = clean_title(&raw) else {
            tracing::debug!("Title generation returned nothing usable");
            return;
        };

        let mut state = self.state.write().await;
        let Some(conversation) = state.book.get_mut(id) else {
            return;
        };
        conversation.title.clone_from(&title);
        if let Err(e) = self.store.save_conversations(state.book.conversations()).await {
            tracing::warn!("Failed to persist generated title: {e}");
        }
        drop(state);

        emit(events, TurnEvent::TitleChanged(title));
    }
}

/// Marks a conversation busy until dropped.
struct TurnGuard {
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
    id: ConversationId,
}

impl TurnGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<ConversationId>>>, id: ConversationId) -> ChatResult<Self> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        if !inserted {
            return Err(ChatError::TurnInFlight(id));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            id,
        })
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

fn emit(events: &EventSender, event: TurnEvent) {
    if events.send(event).is_err() {
        tracing::debug!("Turn event dropped: receiver closed");
    }
}

/// Report a failed turn once and hand the error back.
fn abort(events: &EventSender, err: ChatError) -> ChatError {
    let text = match err.kind() {
        ErrorKind::Config => format!("Error: {err}"),
        ErrorKind::Storage => SAVE_FAILED.to_string(),
        _ => CHAT_FAILED.to_string(),
    };
    tracing::error!("Turn aborted: {err}");
    emit(events, TurnEvent::Notice(Notice::error(text)));
    emit(events, TurnEvent::Phase(TurnPhase::Idle));
    err
}
