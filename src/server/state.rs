//! Application state shared across all request handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::search::{SearchAugmenter, SearchBackend, SearchConfig, SearchError};

/// Shared proxy state.
pub struct ProxyState {
    /// Backend answering `/api/search`.
    pub search: Arc<dyn SearchBackend>,
    /// Directory served for every other path.
    pub static_dir: PathBuf,
}

impl ProxyState {
    /// Build the state from process configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &AppConfig) -> Result<Arc<Self>, SearchError> {
        let search_config = SearchConfig::new().with_api_url(config.brave_api_url.clone());
        let augmenter = SearchAugmenter::new(search_config)?;
        Ok(Self::new(Arc::new(augmenter), config.static_dir.clone()))
    }

    /// Wrap an existing backend.
    #[must_use]
    pub fn new(search: Arc<dyn SearchBackend>, static_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self { search, static_dir })
    }
}
