//! Chat client trait and the OpenAI-compatible HTTP implementation.
//!
//! The trait is the seam between batch orchestration and the network;
//! tests substitute a scripted client.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

use super::messages::ChatMessage;
use crate::error::RemoteCallError;

/// Longest error body kept in a status error.
const ERROR_BODY_LIMIT: usize = 400;

/// One chat-completions call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Merged into the top level of the body, overriding base keys
    pub extra: Option<Map<String, Value>>,
}

impl ChatRequest {
    /// JSON body as sent on the wire.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::from(self.model.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::to_value(&self.messages).unwrap_or(Value::Array(Vec::new())),
        );
        body.insert("temperature".to_string(), Value::from(self.temperature));
        body.insert("max_tokens".to_string(), Value::from(self.max_tokens));
        if let Some(extra) = &self.extra {
            for (key, value) in extra {
                body.insert(key.clone(), value.clone());
            }
        }
        Value::Object(body)
    }
}

/// Anything that can answer a chat-completions request.
///
/// Uses `async_trait` so the orchestrator can hold an `Arc<dyn ChatClient>`.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Client name for logging.
    fn name(&self) -> &str;

    /// Perform one request and return the parsed JSON response.
    async fn complete(&self, request: &ChatRequest) -> Result<Value, RemoteCallError>;
}

/// Client for `POST {base}/v1/chat/completions`.
pub struct OpenAiCompatClient {
    api_base: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.api_base)
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Value, RemoteCallError> {
        let body = request.to_body();

        let resp = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status.as_u16() >= 400 {
            let text = resp.text().await.unwrap_or_default();
            return Err(RemoteCallError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: text.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&text).map_err(|e| RemoteCallError::Decode(e.to_string()))
    }
}

impl OpenAiCompatClient {
    fn transport_error(&self, e: reqwest::Error) -> RemoteCallError {
        if e.is_timeout() {
            RemoteCallError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            RemoteCallError::Transport(e.to_string())
        }
    }
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok()
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::messages::build_messages;
    use mockito::Matcher;
    use serde_json::json;

    fn request(extra: Option<Map<String, Value>>) -> ChatRequest {
        ChatRequest {
            model: "qwen/qwen3-vl-8b".to_string(),
            messages: build_messages("sys", "describe", &["data:image/png;base64,AAA".to_string()]),
            temperature: 0.2,
            max_tokens: 3000,
            extra,
        }
    }

    #[test]
    fn test_body_contains_base_fields() {
        let body = request(None).to_body();
        assert_eq!(body["model"], "qwen/qwen3-vl-8b");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 3000);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_extra_fields_merge_and_override() {
        let extra = json!({"top_p": 0.9, "max_tokens": 10});
        let body = request(extra.as_object().cloned()).to_body();
        assert_eq!(body["top_p"], 0.9);
        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["model"], "qwen/qwen3-vl-8b");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiCompatClient::new("http://host:1234/", "k", Duration::from_secs(1));
        assert_eq!(client.endpoint(), "http://host:1234/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_complete_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({"model": "qwen/qwen3-vl-8b", "top_p": 0.5})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"ok"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&server.url(), "secret", Duration::from_secs(5));
        let extra = json!({"top_p": 0.5});
        let response = client
            .complete(&request(extra.as_object().cloned()))
            .await
            .unwrap();

        assert_eq!(response["choices"][0]["message"]["content"], "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_status_error_truncates_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("x".repeat(1000))
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&server.url(), "k", Duration::from_secs(5));
        let err = client.complete(&request(None)).await.unwrap_err();

        match err {
            RemoteCallError::Status {
                status,
                reason,
                body,
            } => {
                assert_eq!(status, 503);
                assert_eq!(reason, "Service Unavailable");
                assert_eq!(body.len(), 400);
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_invalid_json_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = OpenAiCompatClient::new(&server.url(), "k", Duration::from_secs(5));
        let err = client.complete(&request(None)).await.unwrap_err();
        assert!(matches!(err, RemoteCallError::Decode(_)));
    }

    #[tokio::test]
    async fn test_complete_connection_refused_is_transport_error() {
        let client = OpenAiCompatClient::new("http://127.0.0.1:1", "k", Duration::from_secs(2));
        let err = client.complete(&request(None)).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteCallError::Transport(_) | RemoteCallError::Timeout { .. }
        ));
    }

    #[test]
    fn test_resolve_env_var() {
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }
}
