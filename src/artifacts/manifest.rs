//! Training-run manifest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::preprocessing::Label;

/// Version of the artifact layout written by this crate
pub const FORMAT_VERSION: u32 = 1;

/// Summary of the training run that produced an artifact directory.
///
/// Committed last, so its presence marks a complete Trained directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub crate_version: String,
    pub target: String,
    pub classes: Vec<Label>,
    pub feature_names: Vec<String>,
    /// Model artifacts written by the run, in training order
    pub models: Vec<String>,
    pub trained_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(
        target: impl Into<String>,
        classes: Vec<Label>,
        feature_names: Vec<String>,
        models: Vec<String>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            target: target.into(),
            classes,
            feature_names,
            models,
            trained_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_json_shape() {
        let manifest = Manifest::new(
            "churn",
            vec![Label::Int(0), Label::Int(1)],
            vec!["age".to_string()],
            vec!["SVC".to_string()],
        );
        let value = serde_json::to_value(&manifest).unwrap();
        assert_eq!(value["format_version"], 1);
        assert_eq!(value["classes"], serde_json::json!([0, 1]));
        assert!(value["trained_at"].is_string());

        let back: Manifest = serde_json::from_value(value).unwrap();
        assert_eq!(back, manifest);
    }
}
