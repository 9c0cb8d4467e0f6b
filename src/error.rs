//! Error types for the trainflow pipeline

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Closed classification of every [`PipelineError`].
///
/// Boundary layers (HTTP handlers, the CLI) map on this instead of on
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A data source or a persisted artifact is missing
    SourceNotFound,
    /// The table or a prediction record does not have the expected shape
    SchemaMismatch,
    /// A metric is undefined for the given labels
    DegenerateMetric,
    /// Reading or writing an artifact failed
    PersistenceFailure,
    /// An estimator could not be fitted or was used before fitting
    ModelFailure,
    /// Rejected configuration or call parameters
    InvalidConfig,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SourceNotFound => "source_not_found",
            ErrorKind::SchemaMismatch => "schema_mismatch",
            ErrorKind::DegenerateMetric => "degenerate_metric",
            ErrorKind::PersistenceFailure => "persistence_failure",
            ErrorKind::ModelFailure => "model_failure",
            ErrorKind::InvalidConfig => "invalid_config",
        };
        f.write_str(name)
    }
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data source not found: {}", path.display())]
    DataSourceNotFound { path: PathBuf },

    #[error("Artifact '{artifact}' not found at {}", path.display())]
    ArtifactNotFound { artifact: String, path: PathBuf },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Target column '{target}' not found (available: {})", available.join(", "))]
    TargetNotFound {
        target: String,
        available: Vec<String>,
    },

    #[error("Invalid target column '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Record is missing required features: {}", missing.join(", "))]
    MissingFeatures { missing: Vec<String> },

    #[error("Unknown category '{value}' for feature '{feature}'")]
    UnknownCategory { feature: String, value: String },

    #[error("Invalid value for feature '{feature}': {value}")]
    InvalidFeatureValue { feature: String, value: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Metric '{metric}' is undefined: {reason}")]
    DegenerateMetric {
        metric: &'static str,
        reason: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Inconsistent artifacts: {0}")]
    InconsistentArtifacts(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("All models failed to train: {0}")]
    TrainingFailed(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

impl PipelineError {
    /// The closed error kind this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::DataSourceNotFound { .. } | PipelineError::ArtifactNotFound { .. } => {
                ErrorKind::SourceNotFound
            }
            PipelineError::DataError(_)
            | PipelineError::TargetNotFound { .. }
            | PipelineError::InvalidTarget { .. }
            | PipelineError::MissingFeatures { .. }
            | PipelineError::UnknownCategory { .. }
            | PipelineError::InvalidFeatureValue { .. }
            | PipelineError::InsufficientData(_)
            | PipelineError::ShapeError { .. } => ErrorKind::SchemaMismatch,
            PipelineError::DegenerateMetric { .. } => ErrorKind::DegenerateMetric,
            PipelineError::Persistence { .. }
            | PipelineError::Corrupt { .. }
            | PipelineError::InconsistentArtifacts(_) => ErrorKind::PersistenceFailure,
            PipelineError::TrainingError(_)
            | PipelineError::TrainingFailed(_)
            | PipelineError::ModelNotFitted => ErrorKind::ModelFailure,
            PipelineError::ConfigError(_) | PipelineError::InvalidParameter { .. } => {
                ErrorKind::InvalidConfig
            }
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_parameter(
        name: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::TargetNotFound {
            target: "churn".to_string(),
            available: vec!["age".to_string(), "city".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Target column 'churn' not found (available: age, city)"
        );
    }

    #[test]
    fn test_source_not_found_is_distinguishable() {
        let data = PipelineError::DataSourceNotFound {
            path: PathBuf::from("train.csv"),
        };
        let artifact = PipelineError::ArtifactNotFound {
            artifact: "scaler.json".to_string(),
            path: PathBuf::from("models/scaler.json"),
        };
        assert_eq!(data.kind(), ErrorKind::SourceNotFound);
        assert_eq!(artifact.kind(), ErrorKind::SourceNotFound);
        assert!(matches!(data, PipelineError::DataSourceNotFound { .. }));
        assert!(matches!(artifact, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_io_maps_to_persistence_failure() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = PipelineError::io("models/SVC.json", io_err);
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert!(err.to_string().contains("models/SVC.json"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::SchemaMismatch.to_string(), "schema_mismatch");
        assert_eq!(ErrorKind::DegenerateMetric.to_string(), "degenerate_metric");
    }
}
