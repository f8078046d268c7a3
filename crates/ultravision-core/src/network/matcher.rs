//! Heuristic for "this model id accepts images".

use regex::{Regex, RegexBuilder};

use crate::error::ConfigError;

/// Case-insensitive regex search OR substring hint.
#[derive(Debug, Clone)]
pub struct VisionModelMatcher {
    patterns: Vec<Regex>,
    hints: Vec<String>,
}

impl VisionModelMatcher {
    pub fn new(patterns: &[String], hints: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ConfigError::ValidationError(format!("invalid vision pattern '{p}': {e}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            hints: hints.iter().map(|h| h.to_lowercase()).collect(),
        })
    }

    pub fn is_vision_model(&self, model_id: &str) -> bool {
        if self.patterns.iter().any(|re| re.is_match(model_id)) {
            return true;
        }
        let lowered = model_id.to_lowercase();
        self.hints
            .iter()
            .any(|hint| !hint.is_empty() && lowered.contains(hint.as_str()))
    }

    /// Keep vision-capable ids, preserving order.
    pub fn filter<I>(&self, model_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        model_ids
            .into_iter()
            .filter(|id| self.is_vision_model(id))
            .collect()
    }
}
