//! Failures of web search and page scraping.

use thiserror::Error;

/// Why a search or a page scrape did not produce content.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The named provider needs a key and none was configured.
    #[error("{0} needs an API key")]
    ApiKeyRequired(String),

    /// Non-success answer from the provider.
    #[error("{}", upstream_text(.status, .message))]
    Upstream {
        /// Provider status code.
        status: u16,
        /// Provider-supplied explanation, if any.
        message: Option<String>,
    },

    /// Transport failure or timeout.
    #[error("request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The shared HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    HttpClient(String),

    /// Endpoint or page URL did not parse.
    #[error("bad URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The page was fetched but yields no usable text.
    #[error("no usable page text: {0}")]
    ExtractionFailed(String),

    /// Response content type is neither HTML nor plain text.
    #[error("not a text page ({0})")]
    UnsupportedContentType(String),
}

impl SearchError {
    /// True for errors caused by missing user configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::ApiKeyRequired(_))
    }
}

fn upstream_text(status: &u16, message: &Option<String>) -> String {
    message
        .clone()
        .unwrap_or_else(|| format!("Web search failed with status: {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_prefers_provider_message() {
        let err = SearchError::Upstream {
            status: 422,
            message: Some("Invalid token".to_string()),
        };
        assert_eq!(err.to_string(), "Invalid token");

        let bare = SearchError::Upstream {
            status: 503,
            message: None,
        };
        assert_eq!(bare.to_string(), "Web search failed with status: 503");
    }

    #[test]
    fn test_config_classification() {
        assert!(SearchError::ApiKeyRequired("Brave Search".to_string()).is_config());
        assert!(!SearchError::HttpClient("x".to_string()).is_config());
    }
}
