//! Configuration management for UltraVision.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. CLI flags are applied on top of the loaded values.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::llm::resolve_env_var;
use crate::output::OutputFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Root configuration structure for UltraVision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote endpoint settings
    pub api: ApiConfig,

    /// Prompt settings
    pub prompts: PromptConfig,

    /// Input scanning settings
    pub input: InputConfig,

    /// Batching and retry settings
    pub batch: BatchConfig,

    /// Image normalization settings
    pub image: ImageConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Server discovery settings
    pub discovery: DiscoveryConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.ultravision.ultravision/config.toml
    /// - Linux: ~/.config/ultravision/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\ultravision\config\config.toml
    ///
    /// Falls back to ~/.ultravision/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "ultravision", "ultravision")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".ultravision").join("config.toml")
            })
    }

    /// Parsed output format. Validation guarantees this succeeds for loaded configs.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        OutputFormat::parse(&self.output.format).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "output.format must be one of jsonl, json, text, markdown, csv (got '{}')",
                self.output.format
            ))
        })
    }

    /// Resolved output path (with ~ expansion), defaulting to `outputs.<ext>`.
    pub fn output_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.output.path {
            Some(path) => Ok(expand_tilde(path)),
            None => {
                let format = self.output_format()?;
                Ok(PathBuf::from(format!("outputs.{}", format.extension())))
            }
        }
    }

    /// Resolved failure log path (with ~ expansion).
    pub fn fail_log_path(&self) -> PathBuf {
        expand_tilde(&self.output.fail_log)
    }

    /// Bearer token with `${ENV_VAR}` references resolved.
    ///
    /// An unset variable or empty key falls back to `lm-studio`.
    pub fn api_key(&self) -> String {
        resolve_env_var(&self.api.api_key).unwrap_or_else(|| "lm-studio".to_string())
    }

    /// Parse the `extra` request fields into a JSON object.
    pub fn extra_fields(&self) -> Result<Option<Map<String, Value>>, ConfigError> {
        let Some(raw) = self.api.extra.as_deref() else {
            return Ok(None);
        };
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(_) => Err(ConfigError::InvalidExtra(
                "extra must be a JSON object".to_string(),
            )),
            Err(e) => Err(ConfigError::InvalidExtra(e.to_string())),
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.batch.per_request, 1);
        assert_eq!(config.batch.concurrency, 2);
        assert_eq!(config.batch.retries, 5);
        assert_eq!(config.api.max_tokens, 3000);
        assert_eq!(config.api.timeout_secs, 90);
        assert_eq!(config.output.format, "jsonl");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[api]"));
        assert!(toml.contains("[batch]"));
        assert!(toml.contains("[discovery]"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[batch]\nper_request = 4\n").unwrap();
        assert_eq!(config.batch.per_request, 4);
        assert_eq!(config.batch.concurrency, 2);
        assert_eq!(config.api.model, "qwen/qwen3-vl-8b");
    }

    #[test]
    fn test_default_output_path_follows_format() {
        let mut config = Config::default();
        assert_eq!(config.output_path().unwrap(), PathBuf::from("outputs.jsonl"));

        config.output.format = "markdown".to_string();
        assert_eq!(config.output_path().unwrap(), PathBuf::from("outputs.md"));

        config.output.format = "text".to_string();
        assert_eq!(config.output_path().unwrap(), PathBuf::from("outputs.txt"));
    }

    #[test]
    fn test_extra_fields_object() {
        let mut config = Config::default();
        assert!(config.extra_fields().unwrap().is_none());

        config.api.extra = Some(r#"{"top_p": 0.9}"#.to_string());
        let extra = config.extra_fields().unwrap().unwrap();
        assert_eq!(extra["top_p"], 0.9);
    }

    #[test]
    fn test_extra_fields_rejects_invalid_json() {
        let mut config = Config::default();
        config.api.extra = Some("{not json}".to_string());
        assert!(matches!(
            config.extra_fields(),
            Err(ConfigError::InvalidExtra(_))
        ));

        config.api.extra = Some("[1, 2]".to_string());
        let err = config.extra_fields().unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_api_key_falls_back_to_lm_studio() {
        let mut config = Config::default();
        config.api.api_key = String::new();
        assert_eq!(config.api_key(), "lm-studio");

        config.api.api_key = "${DEFINITELY_NOT_SET_ULTRAVISION_KEY}".to_string();
        assert_eq!(config.api_key(), "lm-studio");

        config.api.api_key = "sk-local".to_string();
        assert_eq!(config.api_key(), "sk-local");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\nformat = \"csv\"\nresume = true\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.output_format().unwrap(), OutputFormat::Csv);
        assert!(config.output.resume);
    }

    #[test]
    fn test_load_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[batch]\nconcurrency = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }
}
