//! Preprocessing configuration

use serde::{Deserialize, Serialize};

/// How prediction records that lack some training features are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Absent features are treated as missing and imputed
    #[default]
    Lenient,
    /// Absent features reject the record
    Strict,
}

/// What happens when a prediction record carries a category never seen at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Fail the prediction with an `UnknownCategory` error
    #[default]
    Reject,
    /// Treat the value as missing so it is imputed like an absent feature
    TreatAsMissing,
}

/// Configuration for data preprocessing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Handling of records with absent features
    pub input_mode: InputMode,

    /// Handling of unseen categorical values
    pub unknown_category: UnknownCategoryPolicy,
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the input mode
    pub fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    /// Builder method to set the unknown-category policy
    pub fn with_unknown_category(mut self, policy: UnknownCategoryPolicy) -> Self {
        self.unknown_category = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.input_mode, InputMode::Lenient);
        assert_eq!(config.unknown_category, UnknownCategoryPolicy::Reject);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new()
            .with_input_mode(InputMode::Strict)
            .with_unknown_category(UnknownCategoryPolicy::TreatAsMissing);

        assert_eq!(config.input_mode, InputMode::Strict);
        assert_eq!(config.unknown_category, UnknownCategoryPolicy::TreatAsMissing);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PreprocessingConfig =
            serde_json::from_str(r#"{"input_mode": "strict"}"#).unwrap();
        assert_eq!(config.input_mode, InputMode::Strict);
        assert_eq!(config.unknown_category, UnknownCategoryPolicy::Reject);
    }
}
