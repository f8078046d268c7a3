//! Port probes and model listing queries.
//!
//! Every failure here collapses to "closed" or "no models".

use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Whether `host:port` accepts a TCP connection within `timeout`.
pub async fn check_port(host: IpAddr, port: u16, timeout: Duration) -> bool {
    if port == 0 {
        return false;
    }
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Model ids from `GET {base_url}/v1/models`.
///
/// Accepts both `{"data": [{"id": ..}]}` and `{"models": [{"id": ..}]}`.
/// Non-200 answers and malformed bodies yield an empty list.
pub async fn fetch_models(client: &reqwest::Client, base_url: &str) -> Vec<String> {
    let url = format!("{}/v1/models", base_url.trim_end_matches('/'));
    let resp = match client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::debug!("Model listing failed for {url}: {e}");
            return Vec::new();
        }
    };
    if resp.status() != reqwest::StatusCode::OK {
        tracing::debug!("Model listing at {url} returned {}", resp.status());
        return Vec::new();
    }

    match resp.json::<Value>().await {
        Ok(payload) => model_ids(&payload),
        Err(e) => {
            tracing::debug!("Model listing at {url} was not JSON: {e}");
            Vec::new()
        }
    }
}

/// Pull non-empty `id` strings out of a models payload, in order.
pub fn model_ids(payload: &Value) -> Vec<String> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| payload.get("models").and_then(Value::as_array));

    rows.map(|rows| {
        rows.iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
