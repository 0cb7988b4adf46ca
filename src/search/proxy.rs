//! Search through a running `/api/search` proxy instead of calling the
//! provider directly.

use serde::{Deserialize, Serialize};

use super::error::SearchError;
use super::types::SearchBundle;
use super::{SearchBackend, SearchFuture};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest<'a> {
    query: &'a str,
    api_key: &'a str,
}

#[derive(Deserialize)]
struct ProxyErrorBody {
    error: Option<String>,
}

/// Client for the search proxy route.
#[derive(Clone, Debug)]
pub struct ProxySearchClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ProxySearchClient {
    /// Target the proxy at `base_url` (e.g. `http://localhost:3333`).
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/search", base_url.trim_end_matches('/')),
        }
    }

    /// Full URL of the search route.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, query: &str, api_key: &str) -> Result<SearchBundle, SearchError> {
        if api_key.is_empty() {
            return Err(SearchError::ApiKeyRequired("Brave Search".to_string()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ProxyRequest { query, api_key })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ProxyErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error);
            return Err(SearchError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<SearchBundle>().await?)
    }
}

impl SearchBackend for ProxySearchClient {
    fn augment<'a>(
        &'a self,
        query: &'a str,
        api_key: &'a str,
    ) -> SearchFuture<'a, Result<SearchBundle, SearchError>> {
        Box::pin(self.post(query, api_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let client = ProxySearchClient::new(reqwest::Client::new(), "http://localhost:3333/");
        assert_eq!(client.endpoint(), "http://localhost:3333/api/search");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(ProxyRequest {
            query: "rust",
            api_key: "k",
        })
        .unwrap_or_default();
        assert_eq!(body, serde_json::json!({"query": "rust", "apiKey": "k"}));
    }

    #[tokio::test]
    async fn test_empty_key_rejected_before_request() {
        let client = ProxySearchClient::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let result = client.augment("rust", "").await;
        assert!(matches!(result, Err(SearchError::ApiKeyRequired(_))));
    }
}
