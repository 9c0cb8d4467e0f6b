//! Top-level pipeline configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::preprocessing::{InputMode, PreprocessingConfig, UnknownCategoryPolicy};
use crate::training::TrainingConfig;

/// Configuration shared by the training and prediction flows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocessing: PreprocessingConfig,
    pub training: TrainingConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file; omitted fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PipelineError::ConfigError(format!("config file not found: {}", path.display()))
            }
            _ => PipelineError::io(path, e),
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| PipelineError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    /// Builder shortcut for strict record validation
    pub fn strict(mut self) -> Self {
        self.preprocessing.input_mode = InputMode::Strict;
        self
    }

    pub fn with_unknown_category(mut self, policy: UnknownCategoryPolicy) -> Self {
        self.preprocessing.unknown_category = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_from_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"training": {"test_size": 0.25, "forest": {"n_estimators": 10}}}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.training.test_size, 0.25);
        assert_eq!(config.training.forest.n_estimators, 10);
        assert_eq!(config.training.random_state, 42);
        assert_eq!(config.preprocessing.input_mode, InputMode::Lenient);
    }

    #[test]
    fn test_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"training": {"test_size": 2.0}}"#).unwrap();

        let err = PipelineConfig::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/trainflow.json").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError(_)));
    }

    #[test]
    fn test_builders() {
        let config = PipelineConfig::new()
            .strict()
            .with_unknown_category(UnknownCategoryPolicy::TreatAsMissing);
        assert_eq!(config.preprocessing.input_mode, InputMode::Strict);
        assert_eq!(
            config.preprocessing.unknown_category,
            UnknownCategoryPolicy::TreatAsMissing
        );
    }
}
