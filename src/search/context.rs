//! Prompt augmentation text built from a [`SearchBundle`].

use std::fmt::Write as _;

use crate::search::types::SearchBundle;

/// Characters of scraped content kept per source.
pub const CONTENT_CHAR_LIMIT: usize = 1500;

const CONTEXT_HEADER: &str = "--- Web Search Context ---\n\n";
const CONTEXT_FOOTER: &str = "--------------------------\n\n";
const SCRAPED_HEADING: &str = "## Full Content from Top Results:\n\n";
const REMAINING_HEADING: &str = "## Additional Search Results (Metadata & Summaries):\n\n";
const SYNTHESIS_INSTRUCTION: &str = "Synthesize the information from the web search context above to provide a detailed, multi-paragraph answer to the following question: ";

/// Render the numbered context block for a bundle.
#[must_use]
pub fn context_block(bundle: &SearchBundle) -> String {
    let mut block = String::from(CONTEXT_HEADER);

    if !bundle.scraped_results.is_empty() {
        block.push_str(SCRAPED_HEADING);
        for (index, result) in bundle.scraped_results.iter().enumerate() {
            let content: String = result.content.chars().take(CONTENT_CHAR_LIMIT).collect();
            let _ = write!(
                block,
                "Source [{}]: {}\nContent: {content}...\n\n",
                index + 1,
                result.title
            );
        }
    }

    if !bundle.remaining_results.is_empty() {
        block.push_str(REMAINING_HEADING);
        let offset = bundle.scraped_results.len();
        for (index, result) in bundle.remaining_results.iter().enumerate() {
            let _ = write!(
                block,
                "Source [{}]: {}\nURL: {}\nSummary: {}\n\n",
                offset + index + 1,
                result.title,
                result.url,
                result.description
            );
        }
    }

    block.push_str(CONTEXT_FOOTER);
    block
}

/// Wrap the user's literal question with the context block and the
/// synthesis instruction. This text is sent to the model, never stored.
#[must_use]
pub fn augmented_prompt(bundle: &SearchBundle, question: &str) -> String {
    format!("{}{SYNTHESIS_INSTRUCTION}{question}", context_block(bundle))
}

/// HTML "Sources" appendix listing every source in rank order.
///
/// Empty when the bundle has no sources.
#[must_use]
pub fn sources_appendix(bundle: &SearchBundle) -> String {
    if bundle.is_empty() {
        return String::new();
    }

    let mut html = String::from("<hr><div class=\"sources-container\"><h4>Sources</h4><ol>");
    for (title, url) in bundle.sources() {
        let _ = write!(
            html,
            "<li><a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></li>",
            escape_angle_brackets(title)
        );
    }
    html.push_str("</ol></div>");
    html
}

fn escape_angle_brackets(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::types::{ScrapedResult, SummaryResult};

    fn bundle(scraped: usize, remaining: usize) -> SearchBundle {
        SearchBundle {
            scraped_results: (1..=scraped)
                .map(|i| ScrapedResult {
                    url: format!("https://s{i}"),
                    title: format!("S{i}"),
                    content: format!("content {i}"),
                })
                .collect(),
            remaining_results: (1..=remaining)
                .map(|i| SummaryResult {
                    url: format!("https://r{i}"),
                    title: format!("R{i}"),
                    description: format!("summary {i}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_numbering_is_consecutive_across_groups() {
        let block = context_block(&bundle(3, 2));
        assert!(block.starts_with(CONTEXT_HEADER));
        assert!(block.ends_with(CONTEXT_FOOTER));
        assert!(block.contains("Source [1]: S1\nContent: content 1...\n\n"));
        assert!(block.contains("Source [3]: S3\n"));
        assert!(block.contains("Source [4]: R1\nURL: https://r1\nSummary: summary 1\n\n"));
        assert!(block.contains("Source [5]: R2\n"));
        let scraped_at = block.find(SCRAPED_HEADING).unwrap_or(usize::MAX);
        let remaining_at = block.find(REMAINING_HEADING).unwrap_or(0);
        assert!(scraped_at < remaining_at);
    }

    #[test]
    fn test_empty_groups_omit_headings() {
        let block = context_block(&bundle(0, 1));
        assert!(!block.contains(SCRAPED_HEADING));
        assert!(block.contains("Source [1]: R1"));

        let empty = context_block(&SearchBundle::default());
        assert_eq!(empty, format!("{CONTEXT_HEADER}{CONTEXT_FOOTER}"));
    }

    #[test]
    fn test_content_truncated_with_marker() {
        let mut b = bundle(1, 0);
        b.scraped_results[0].content = "\u{e9}".repeat(CONTENT_CHAR_LIMIT + 10);
        let block = context_block(&b);
        let expected = format!("Content: {}...\n", "\u{e9}".repeat(CONTENT_CHAR_LIMIT));
        assert!(block.contains(&expected));
    }

    #[test]
    fn test_augmented_prompt_ends_with_question() {
        let prompt = augmented_prompt(&bundle(1, 1), "What is Rust?");
        assert!(prompt.starts_with(CONTEXT_HEADER));
        assert!(prompt.ends_with(
            "to provide a detailed, multi-paragraph answer to the following question: What is Rust?"
        ));
    }

    #[test]
    fn test_sources_appendix_order_and_escaping() {
        let mut b = bundle(2, 1);
        b.scraped_results[1].title = "<b>Bold</b>".to_string();
        let html = sources_appendix(&b);
        assert!(html.starts_with("<hr><div class=\"sources-container\"><h4>Sources</h4><ol>"));
        assert!(html.ends_with("</ol></div>"));
        assert!(html.contains("&lt;b&gt;Bold&lt;/b&gt;"));
        let s1 = html.find("https://s1").unwrap_or(usize::MAX);
        let s2 = html.find("https://s2").unwrap_or(usize::MAX);
        let r1 = html.find("https://r1").unwrap_or(0);
        assert!(s1 < s2 && s2 < r1);
    }

    #[test]
    fn test_sources_appendix_empty_bundle() {
        assert!(sources_appendix(&SearchBundle::default()).is_empty());
    }
}
