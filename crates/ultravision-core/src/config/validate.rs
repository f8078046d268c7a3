//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::network::VisionModelMatcher;
use crate::output::OutputFormat;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.per_request == 0 {
            return Err(ConfigError::ValidationError(
                "batch.per_request must be > 0".into(),
            ));
        }
        if self.batch.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "batch.concurrency must be > 0".into(),
            ));
        }
        if self.batch.backoff_base < 1.0 {
            return Err(ConfigError::ValidationError(
                "batch.backoff_base must be >= 1.0".into(),
            ));
        }
        if self.batch.backoff_cap_secs <= 0.0 {
            return Err(ConfigError::ValidationError(
                "batch.backoff_cap_secs must be > 0".into(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be > 0".into(),
            ));
        }
        if self.api.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "api.max_tokens must be > 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.api.temperature) {
            return Err(ConfigError::ValidationError(
                "api.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.image.max_side == Some(0) {
            return Err(ConfigError::ValidationError(
                "image.max_side must be > 0".into(),
            ));
        }
        if OutputFormat::parse(&self.output.format).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "output.format must be one of jsonl, json, text, markdown, csv (got '{}')",
                self.output.format
            )));
        }
        if self.discovery.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.max_connections must be > 0".into(),
            ));
        }
        if self.discovery.probe_timeout_ms == 0 || self.discovery.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "discovery timeouts must be > 0".into(),
            ));
        }
        VisionModelMatcher::new(
            &self.discovery.vision_patterns,
            &self.discovery.vision_hints,
        )?;
        self.extra_fields()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_per_request() {
        let mut config = Config::default();
        config.batch.per_request = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("per_request"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.api.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_validate_rejects_unknown_format() {
        let mut config = Config::default();
        config.output.format = "xml".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output.format"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_temperature() {
        let mut config = Config::default();
        config.api.temperature = 2.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_validate_rejects_bad_vision_pattern() {
        let mut config = Config::default();
        config.discovery.vision_patterns = vec!["qwen(".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("vision pattern"));
    }

    #[test]
    fn test_validate_rejects_non_object_extra() {
        let mut config = Config::default();
        config.api.extra = Some("42".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidExtra(_))
        ));
    }
}
