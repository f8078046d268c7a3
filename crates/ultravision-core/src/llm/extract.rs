//! Pull the generated text out of a chat-completions response.

use serde_json::Value;

/// First choice's message content, else its legacy `text` field, else "".
///
/// Never fails: malformed or empty responses yield an empty string.
pub fn extract_text(response: &Value) -> String {
    let Some(choice) = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return String::new();
    };

    let content = choice
        .get("message")
        .and_then(|message| message.get("content"))
        .map(content_text)
        .unwrap_or_default();
    if !content.is_empty() {
        return content;
    }

    choice
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Content is usually a string; some servers answer with text blocks.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
