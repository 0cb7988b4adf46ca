//! Web search augmentation for chat turns.
//!
//! This module turns a user question into grounding material:
//! - Brave Search API lookup (`brave`)
//! - Concurrent scraping of the top results (`content`)
//! - The context block and "Sources" appendix (`context`)
//! - A client for the `/api/search` proxy route (`proxy`)

pub mod brave;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod proxy;
pub mod types;

pub use config::{SCRAPE_FAILED_PLACEHOLDER, SCRAPED_RESULT_COUNT, SearchConfig};
pub use context::{augmented_prompt, sources_appendix};
pub use error::SearchError;
pub use proxy::ProxySearchClient;
pub use types::{ScrapedResult, SearchBundle, SearchHit, SummaryResult};

use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;

/// Boxed future returned by [`SearchBackend`] methods.
pub type SearchFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Produces a [`SearchBundle`] for a query.
pub trait SearchBackend: Send + Sync {
    /// Search, scrape the top results and return the bundle.
    fn augment<'a>(
        &'a self,
        query: &'a str,
        api_key: &'a str,
    ) -> SearchFuture<'a, Result<SearchBundle, SearchError>>;
}

/// Brave-backed search augmenter.
pub struct SearchAugmenter {
    config: SearchConfig,
    client: reqwest::Client,
}

impl SearchAugmenter {
    /// Create an augmenter with the given configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let client = Self::build_client(&config)?;
        Ok(Self { config, client })
    }

    fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
        use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

        let mut headers = HeaderMap::new();
        if let Ok(lang) = HeaderValue::from_str("en-US,en;q=0.5") {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| SearchError::HttpClient(e.to_string()))
    }

    /// Search and build the bundle.
    ///
    /// # Errors
    /// Fails when the key is empty or the provider call fails. Individual
    /// page scrape failures never fail the batch.
    pub async fn search(&self, query: &str, api_key: &str) -> Result<SearchBundle, SearchError> {
        let hits = brave::search(&self.client, &self.config.api_url, query, api_key).await?;
        tracing::info!("Web search for {query:?} returned {} results", hits.len());

        let split = hits.len().min(SCRAPED_RESULT_COUNT);
        let mut hits = hits;
        let remaining = hits.split_off(split);

        // join_all keeps input order, so rank order survives completion order.
        let scraped_results = join_all(hits.into_iter().map(|hit| self.scrape(hit))).await;

        Ok(SearchBundle {
            scraped_results,
            remaining_results: remaining.into_iter().map(SummaryResult::from).collect(),
        })
    }

    async fn scrape(&self, hit: SearchHit) -> ScrapedResult {
        let content = match content::scrape_page(&self.client, &hit.url, &self.config).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to scrape {}: {e}", hit.url);
                SCRAPE_FAILED_PLACEHOLDER.to_string()
            }
        };

        ScrapedResult {
            url: hit.url,
            title: hit.title,
            content,
        }
    }
}

impl SearchBackend for SearchAugmenter {
    fn augment<'a>(
        &'a self,
        query: &'a str,
        api_key: &'a str,
    ) -> SearchFuture<'a, Result<SearchBundle, SearchError>> {
        Box::pin(self.search(query, api_key))
    }
}
