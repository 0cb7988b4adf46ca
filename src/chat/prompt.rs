//! Outgoing message assembly and title prompts.

use crate::conversations::Message;
use crate::llm::SamplingOptions;

/// Sampling temperature for title generation.
pub const TITLE_TEMPERATURE: f32 = 0.2;

/// Build the chat payload: system prompt, prior history, then the user turn.
///
/// `user_content` is the augmented prompt when search succeeded and the
/// literal text otherwise.
#[must_use]
pub fn assemble_messages(system_prompt: &str, history: &[Message], user_content: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt.trim()));
    messages.extend_from_slice(history);
    messages.push(Message::user(user_content));
    messages
}

/// Prompt asking the model to name a conversation from its first message.
#[must_use]
pub fn title_prompt(first_message: &str) -> String {
    format!(
        "Generate a short, concise title (under 5 words) for this conversation based on the user's first message: \"{first_message}\""
    )
}

/// Options sent with the title request.
#[must_use]
pub fn title_options() -> SamplingOptions {
    SamplingOptions {
        temperature: Some(TITLE_TEMPERATURE),
        ..SamplingOptions::default()
    }
}

/// Trim a generated title and strip double quotes.
///
/// Returns `None` when nothing usable is left.
#[must_use]
pub fn clean_title(raw: &str) -> Option<String> {
    let title = raw.trim().replace('"', "");
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
