//! Chat message construction for OpenAI-compatible vision endpoints.
//!
//! Images travel as `image_url` content blocks holding data URLs.

use serde::Serialize;

/// One entry of the `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain string for system messages, block list for the user turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ChatContent>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Build the two-message conversation for one batch.
///
/// The user turn starts with the prompt text (omitted when empty) and is
/// followed by one image block per data URL, in input order.
pub fn build_messages(system: &str, user: &str, data_urls: &[String]) -> Vec<ChatMessage> {
    let mut parts = Vec::with_capacity(data_urls.len() + 1);
    if !user.is_empty() {
        parts.push(ChatContent::Text {
            text: user.to_string(),
        });
    }
    parts.extend(data_urls.iter().map(|url| ChatContent::ImageUrl {
        image_url: ImageUrl { url: url.clone() },
    }));

    vec![
        ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(system.to_string()),
        },
        ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        },
    ]
}
