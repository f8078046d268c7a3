//! Sub-configuration structs with defaults matching the CLI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Remote chat-completions endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server base URL, without the `/v1` suffix
    pub base_url: String,

    /// Bearer token (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Sampling temperature
    pub temperature: f64,

    /// Maximum tokens to generate per request
    pub max_tokens: u32,

    /// Per-request HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Extra JSON object merged into the request body (e.g. `{"top_p":0.9}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
            api_key: "lm-studio".to_string(),
            model: "qwen/qwen3-vl-8b".to_string(),
            temperature: 0.2,
            max_tokens: 3000,
            timeout_secs: 90,
            extra: None,
        }
    }
}

/// Prompt text sent with every batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// System message
    pub system: String,

    /// User text placed before the images; empty means images only
    pub user: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system: "You are a precise, concise vision assistant.".to_string(),
            user: "Describe the image succinctly with key details.".to_string(),
        }
    }
}

/// Input scanning settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Scan subdirectories
    pub recursive: bool,

    /// File name glob patterns; empty selects the common image extensions
    pub patterns: Vec<String>,

    /// Maximum number of images to process; 0 means no limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Batching, concurrency and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Images per API request
    pub per_request: usize,

    /// Concurrent API calls
    pub concurrency: usize,

    /// Retries per batch after the first attempt
    pub retries: u32,

    /// Exponential backoff base (seconds = base^attempt)
    pub backoff_base: f64,

    /// Upper bound for a single backoff sleep in seconds
    pub backoff_cap_secs: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            per_request: 1,
            concurrency: 2,
            retries: 5,
            backoff_base: 1.7,
            backoff_cap_secs: 25.0,
        }
    }
}

/// Optional image normalization before upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Apply the EXIF orientation tag
    pub autorotate: bool,

    /// Downscale so max(width, height) <= this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_side: Option<u32>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: jsonl, json, text, markdown or csv
    pub format: String,

    /// Output file (defaults to `outputs.<ext>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Where failed batches are logged
    pub fail_log: PathBuf,

    /// Skip images already present in a jsonl output file
    pub resume: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "jsonl".to_string(),
            path: None,
            fail_log: PathBuf::from("failures.log"),
            resume: false,
        }
    }
}

/// Server discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Pick the first discovered server and model before processing
    pub auto: bool,

    /// LM Studio port (0 disables)
    pub lm_studio_port: u16,

    /// Ollama port (0 disables)
    pub ollama_port: u16,

    /// TCP connect timeout for port probes in milliseconds
    pub probe_timeout_ms: u64,

    /// Timeout for the models listing request in milliseconds
    pub request_timeout_ms: u64,

    /// Maximum simultaneous outbound connections per phase
    pub max_connections: usize,

    /// Subnets with more hosts than this are not scanned
    pub max_subnet_hosts: usize,

    /// Case-insensitive substrings that mark a model as vision-capable
    pub vision_hints: Vec<String>,

    /// Case-insensitive regexes that mark a model as vision-capable
    pub vision_patterns: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            auto: false,
            lm_studio_port: 1234,
            ollama_port: 11434,
            probe_timeout_ms: 300,
            request_timeout_ms: 2000,
            max_connections: 30,
            max_subnet_hosts: 65_534,
            vision_hints: vec!["gemma3".to_string()],
            vision_patterns: vec![
                r"qwen\d+(\.\d+)?-?vl".to_string(),
                r"qwen/qwen\d+(\.\d+)?-?vl".to_string(),
            ],
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
