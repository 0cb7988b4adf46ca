//! Brave web search client.

use reqwest::header::ACCEPT;

use crate::search::error::SearchError;
use crate::search::types::SearchHit;

const TOKEN_HEADER: &str = "X-Subscription-Token";

/// Run `query` against the Brave endpoint at `api_url`; hits keep rank order.
///
/// # Errors
/// `ApiKeyRequired` for an empty key, `Upstream` for a non-success status,
/// transport and decoding failures otherwise.
pub async fn search(
    client: &reqwest::Client,
    api_url: &str,
    query: &str,
    api_key: &str,
) -> Result<Vec<SearchHit>, SearchError> {
    if api_key.is_empty() {
        return Err(SearchError::ApiKeyRequired("Brave Search".to_string()));
    }

    let response = client
        .get(query_url(api_url, query)?)
        .header(TOKEN_HEADER, api_key)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), %body, "brave search rejected the query");
        return Err(SearchError::Upstream {
            status: status.as_u16(),
            message: wire::error_message(&body),
        });
    }

    let page: wire::SearchPage = response.json().await?;
    Ok(page.into_hits())
}

fn query_url(api_url: &str, query: &str) -> Result<url::Url, SearchError> {
    let mut url = url::Url::parse(api_url)?;
    url.query_pairs_mut().append_pair("q", query);
    Ok(url)
}

/// JSON shapes of the Brave API.
mod wire {
    use serde::Deserialize;

    use crate::search::types::SearchHit;

    #[derive(Deserialize)]
    pub(super) struct SearchPage {
        web: Option<WebSection>,
    }

    #[derive(Deserialize)]
    struct WebSection {
        #[serde(default)]
        results: Vec<WebResult>,
    }

    #[derive(Deserialize)]
    struct WebResult {
        #[serde(default)]
        title: String,
        url: String,
        #[serde(default)]
        description: String,
    }

    impl SearchPage {
        pub(super) fn into_hits(self) -> Vec<SearchHit> {
            let results = self.web.map_or_else(Vec::new, |web| web.results);
            results
                .into_iter()
                .map(|r| SearchHit {
                    title: r.title,
                    url: r.url,
                    description: r.description,
                })
                .collect()
        }
    }

    /// Brave nests its message under `error.detail`; proxies in front of it
    /// often use a top-level `message`.
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        detail: Option<String>,
    }

    pub(super) fn error_message(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .message
            .or_else(|| parsed.error.and_then(|e| e.detail))
            .filter(|m| !m.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_is_form_encoded() {
        let Ok(url) = query_url("https://api.search.brave.com/res/v1/web/search", "rust & tokio") else {
            panic!("valid endpoint");
        };
        assert_eq!(url.query(), Some("q=rust+%26+tokio"));
    }

    #[test]
    fn test_query_url_rejects_garbage() {
        assert!(matches!(query_url("not a url", "q"), Err(SearchError::InvalidUrl(_))));
    }

    #[test]
    fn test_hits_keep_rank_order() {
        let json = r#"{"web": {"results": [
            {"title": "One", "url": "https://one", "description": "first"},
            {"title": "Two", "url": "https://two"}
        ]}}"#;
        let Ok(page) = serde_json::from_str::<wire::SearchPage>(json) else {
            panic!("fixture parses");
        };
        let hits = page.into_hits();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "One");
        assert_eq!(hits[1].description, "");
    }

    #[test]
    fn test_missing_web_section_is_empty() {
        let Ok(page) = serde_json::from_str::<wire::SearchPage>(r#"{"type": "search"}"#) else {
            panic!("fixture parses");
        };
        assert!(page.into_hits().is_empty());
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            wire::error_message(r#"{"message": "quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
        assert_eq!(
            wire::error_message(r#"{"error": {"detail": "Invalid token", "status": 422}}"#).as_deref(),
            Some("Invalid token")
        );
        assert_eq!(wire::error_message("<html>bad gateway</html>"), None);
    }
}
