//! Search result types shared by the augmenter and the proxy route.

use serde::{Deserialize, Serialize};

/// A ranked hit returned by the search provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Provider snippet (may be empty).
    pub description: String,
}

/// A top result whose page text was fetched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedResult {
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Extracted plain text, or the scrape-failure placeholder.
    pub content: String,
}

/// A lower-ranked result passed through with the provider summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    /// Page URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Provider snippet.
    pub description: String,
}

impl From<SearchHit> for SummaryResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            url: hit.url,
            title: hit.title,
            description: hit.description,
        }
    }
}

/// Outcome of one search augmentation, in provider rank order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchBundle {
    /// Scraped top results.
    #[serde(default)]
    pub scraped_results: Vec<ScrapedResult>,
    /// Remaining results as summaries.
    #[serde(default)]
    pub remaining_results: Vec<SummaryResult>,
}

impl SearchBundle {
    /// Total number of sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scraped_results.len() + self.remaining_results.len()
    }

    /// True when the provider returned nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(title, url)` of every source, scraped first.
    pub fn sources(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.scraped_results
            .iter()
            .map(|r| (r.title.as_str(), r.url.as_str()))
            .chain(
                self.remaining_results
                    .iter()
                    .map(|r| (r.title.as_str(), r.url.as_str())),
            )
    }
}
