//! SQLite-backed key-value store for settings and conversations.
//!
//! Two independent records are kept, each as a JSON document under its own
//! key, matching the layout the browser client used in local storage.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use rusqlite::OptionalExtension;
use thiserror::Error;
use tokio_rusqlite::Connection;

use super::types::ConversationMap;
use crate::settings::Settings;

/// Key of the settings record.
pub const SETTINGS_KEY: &str = "ollamaChatSettings";

/// Key of the conversations record.
pub const CONVERSATIONS_KEY: &str = "ollamaConversations";

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for state store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` access failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for state store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for the two application records.
pub trait StateStore: Send + Sync {
    /// Load settings, default-filling missing keys. Absent record yields defaults.
    fn load_settings(&self) -> StoreFuture<'_, StoreResult<Settings>>;

    /// Persist settings.
    fn save_settings(&self, settings: &Settings) -> StoreFuture<'_, StoreResult<()>>;

    /// Load every conversation. Absent record yields an empty map.
    fn load_conversations(&self) -> StoreFuture<'_, StoreResult<ConversationMap>>;

    /// Persist every conversation.
    fn save_conversations(
        &self,
        conversations: &ConversationMap,
    ) -> StoreFuture<'_, StoreResult<()>>;
}

/// `SQLite` implementation of the state store.
pub struct SqliteStateStore {
    conn: Arc<Connection>,
    table: String,
}

impl SqliteStateStore {
    /// Table name for the key-value records.
    pub const DEFAULT_TABLE: &'static str = "kv_store";

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::new(Arc::new(conn)).await
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub async fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::new(Arc::new(conn)).await
    }

    /// Initialize the store and create the table if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if database operations fail.
    pub async fn new(conn: Arc<Connection>) -> StoreResult<Self> {
        let table = Self::DEFAULT_TABLE.to_string();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }

    async fn read(&self, key: &'static str) -> StoreResult<Option<String>> {
        let table = self.table.clone();
        let value = self
            .conn
            .call(move |conn| {
                let value = conn
                    .query_row(
                        &format!("SELECT value FROM {table} WHERE key = ?1"),
                        rusqlite::params![key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;
        Ok(value)
    }

    async fn write(&self, key: &'static str, value: String) -> StoreResult<()> {
        let table = self.table.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO {table} (key, value, updated_at) VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                        updated_at = excluded.updated_at"
                    ),
                    rusqlite::params![key, value, now_ms],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

impl StateStore for SqliteStateStore {
    fn load_settings(&self) -> StoreFuture<'_, StoreResult<Settings>> {
        Box::pin(async move {
            match self.read(SETTINGS_KEY).await? {
                Some(json) => Ok(serde_json::from_str(&json)?),
                None => Ok(Settings::default()),
            }
        })
    }

    fn save_settings(&self, settings: &Settings) -> StoreFuture<'_, StoreResult<()>> {
        let encoded = serde_json::to_string(settings);
        Box::pin(async move { self.write(SETTINGS_KEY, encoded?).await })
    }

    fn load_conversations(&self) -> StoreFuture<'_, StoreResult<ConversationMap>> {
        Box::pin(async move {
            match self.read(CONVERSATIONS_KEY).await? {
                Some(json) => Ok(serde_json::from_str(&json)?),
                None => Ok(ConversationMap::new()),
            }
        })
    }

    fn save_conversations(
        &self,
        conversations: &ConversationMap,
    ) -> StoreFuture<'_, StoreResult<()>> {
        let encoded = serde_json::to_string(conversations);
        Box::pin(async move {
            self.write(CONVERSATIONS_KEY, encoded?).await?;
            tracing::debug!("Persisted conversations record");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::types::{Conversation, ConversationId, Message};

    #[tokio::test]
    async fn test_empty_store_yields_defaults() {
        let Ok(store) = SqliteStateStore::in_memory().await else {
            panic!("in-memory store");
        };
        let settings = store.load_settings().await.ok();
        assert_eq!(settings, Some(Settings::default()));
        let conversations = store.load_conversations().await.ok();
        assert_eq!(conversations.map(|c| c.len()), Some(0));
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let Ok(store) = SqliteStateStore::in_memory().await else {
            panic!("in-memory store");
        };
        let settings = Settings {
            default_model: "llama3".to_string(),
            brave_api_key: "token".to_string(),
            ..Settings::default()
        };
        assert!(store.save_settings(&settings).await.is_ok());
        assert_eq!(store.load_settings().await.ok(), Some(settings));
    }

    #[tokio::test]
    async fn test_conversations_overwrite() {
        let Ok(store) = SqliteStateStore::in_memory().await else {
            panic!("in-memory store");
        };
        let mut map = ConversationMap::new();
        map.insert(ConversationId(1), Conversation::default());
        assert!(store.save_conversations(&map).await.is_ok());

        let mut second = Conversation::with_model("mistral");
        second.history.push(Message::user("q"));
        second.history.push(Message::assistant("a"));
        map.insert(ConversationId(2), second);
        assert!(store.save_conversations(&map).await.is_ok());

        assert_eq!(store.load_conversations().await.ok(), Some(map));
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("temp dir");
        };
        let path = dir.path().join("state.db");
        let mut map = ConversationMap::new();
        map.insert(ConversationId(5), Conversation::with_model("llama3"));

        {
            let Ok(store) = SqliteStateStore::open(&path).await else {
                panic!("open store");
            };
            assert!(store.save_conversations(&map).await.is_ok());
        }

        let Ok(store) = SqliteStateStore::open(&path).await else {
            panic!("reopen store");
        };
        assert_eq!(store.load_conversations().await.ok(), Some(map));
    }

    #[tokio::test]
    async fn test_legacy_settings_are_default_filled() {
        let Ok(store) = SqliteStateStore::in_memory().await else {
            panic!("in-memory store");
        };
        assert!(
            store
                .write(SETTINGS_KEY, r#"{"ollamaUrl":"http://box:11434"}"#.to_string())
                .await
                .is_ok()
        );
        let settings = store.load_settings().await.unwrap_or_default();
        assert_eq!(settings.ollama_url, "http://box:11434");
        assert_eq!(settings.theme, "light");
    }
}
