//! Remote vision model calls over the OpenAI chat-completions protocol.
//!
//! - **client**: `ChatClient` trait and the reqwest-backed implementation
//! - **messages**: system + user message construction with image blocks
//! - **extract**: text extraction from heterogeneous response shapes
//! - **retry**: exponential backoff between attempts

pub(crate) mod client;
pub(crate) mod extract;
pub(crate) mod messages;
pub(crate) mod retry;

pub use client::{resolve_env_var, ChatClient, ChatRequest, OpenAiCompatClient};
pub use extract::extract_text;
pub use messages::{build_messages, ChatContent, ChatMessage, ImageUrl, MessageContent};
pub use retry::backoff_delay;
