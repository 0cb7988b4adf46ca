//! Page fetching and visible-text extraction for the top search results.

use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use scraper::{ElementRef, Html, Selector};

use crate::search::config::SearchConfig;
use crate::search::error::SearchError;

/// Subtrees whose text never counts as page content.
const SKIPPED_TAGS: [&str; 5] = ["script", "style", "nav", "footer", "header"];

/// Content types worth extracting text from.
const TEXT_TYPES: [&str; 2] = ["text/html", "text/plain"];

/// Download `url` and return its body text.
///
/// # Errors
/// Fails on an invalid URL, a transport error or timeout, a non-success
/// status, an oversized body or a non-text content type.
pub async fn scrape_page(
    client: &reqwest::Client,
    url: &str,
    config: &SearchConfig,
) -> Result<String, SearchError> {
    let target = url::Url::parse(url)?;
    let response = client
        .get(target)
        .timeout(config.scrape_timeout)
        .header(USER_AGENT, config.random_user_agent())
        .send()
        .await?
        .error_for_status()?;

    accept_response(&response, config.max_content_length)?;
    let body = read_capped(response, config.max_content_length).await?;
    Ok(extract_body_text(&String::from_utf8_lossy(&body)))
}

/// Collect the body, giving up as soon as it grows past `max_len`.
/// Chunked responses carry no `Content-Length`.
async fn read_capped(response: reqwest::Response, max_len: usize) -> Result<Vec<u8>, SearchError> {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len().saturating_add(chunk.len()) > max_len {
            return Err(too_large(max_len));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn too_large(max_len: usize) -> SearchError {
    SearchError::ExtractionFailed(format!("body exceeds {max_len} bytes"))
}

/// Reject bodies that are too large or not text before downloading them.
fn accept_response(response: &reqwest::Response, max_len: usize) -> Result<(), SearchError> {
    let oversized = response
        .content_length()
        .is_some_and(|len| usize::try_from(len).map_or(true, |len| len > max_len));
    if oversized {
        return Err(too_large(max_len));
    }

    // A missing header is treated as HTML.
    let Some(value) = response.headers().get(CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = value.to_str().unwrap_or_default();
    if TEXT_TYPES.iter().any(|t| content_type.contains(t)) {
        Ok(())
    } else {
        Err(SearchError::UnsupportedContentType(content_type.to_string()))
    }
}

/// Text of the document body with skipped subtrees removed and every
/// whitespace run collapsed to a single space.
#[must_use]
pub fn extract_body_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };

    let mut raw = String::new();
    for body in document.select(&body_selector).take(1) {
        push_visible_text(body, &mut raw);
    }
    collapse_whitespace(&raw)
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for node in element.children() {
        match ElementRef::wrap(node) {
            Some(child) if SKIPPED_TAGS.contains(&child.value().name()) => {}
            Some(child) => push_visible_text(child, out),
            None => {
                if let Some(text) = node.value().as_text() {
                    out.push_str(text);
                }
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
