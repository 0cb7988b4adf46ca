//! Search augmenter settings.

use std::time::Duration;

use rand::seq::SliceRandom;

/// Brave Search API endpoint.
pub const BRAVE_API_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Number of top results whose pages are scraped.
pub const SCRAPED_RESULT_COUNT: usize = 3;

/// Placeholder content for a page that could not be scraped.
pub const SCRAPE_FAILED_PLACEHOLDER: &str = "Content scraping failed.";

/// Browser user agents sent when fetching pages.
const BROWSER_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Timeouts, limits and endpoint of the search augmenter.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Web search endpoint.
    pub api_url: String,
    /// Overall timeout of the provider call.
    pub request_timeout: Duration,
    /// Per-page timeout when scraping top results.
    pub scrape_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Largest page accepted, in bytes.
    pub max_content_length: usize,
    /// User agents picked at random per page.
    pub user_agents: Vec<&'static str>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: BRAVE_API_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            scrape_timeout: Duration::from_secs(4),
            connect_timeout: Duration::from_secs(4),
            max_content_length: 10 * 1024 * 1024,
            user_agents: BROWSER_USER_AGENTS.to_vec(),
        }
    }
}

impl SearchConfig {
    /// Defaults: Brave endpoint, 4 s page timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the augmenter at another search endpoint.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the per-page scrape timeout.
    #[must_use]
    pub const fn with_scrape_timeout(mut self, timeout: Duration) -> Self {
        self.scrape_timeout = timeout;
        self
    }

    /// A user agent for the next page request.
    #[must_use]
    pub fn random_user_agent(&self) -> &'static str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(BROWSER_USER_AGENTS[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SearchConfig::new();
        assert_eq!(config.api_url, BRAVE_API_URL);
        assert_eq!(config.scrape_timeout, Duration::from_secs(4));
        assert_eq!(config.user_agents.len(), 3);
    }

    #[test]
    fn test_user_agent_falls_back_when_list_empty() {
        assert!(SearchConfig::new().random_user_agent().starts_with("Mozilla/5.0"));

        let config = SearchConfig {
            user_agents: Vec::new(),
            ..SearchConfig::default()
        };
        assert_eq!(config.random_user_agent(), BROWSER_USER_AGENTS[0]);
    }
}
