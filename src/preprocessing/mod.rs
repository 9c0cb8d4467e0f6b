//! Data preprocessing module
//!
//! Turns a mixed-type training table into a standardized numeric matrix:
//! - Categorical label encoding over closed, sorted vocabularies
//! - Mean imputation of missing cells
//! - Standard scaling
//!
//! The fitted state is persisted so a single prediction record can be put
//! through exactly the same transform later.

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;
mod target;

pub use config::{InputMode, PreprocessingConfig, UnknownCategoryPolicy};
pub use encoder::CategoryEncoder;
pub use imputer::Imputer;
pub use pipeline::{PreprocessingState, Preprocessor};
pub use scaler::StandardScaler;
pub use target::{Label, TargetVector};

use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// Flat feature name to scalar mapping for one prediction
pub type FeatureRecord = Map<String, Value>;

/// Accept a JSON value as a record; only objects qualify
pub fn record_from_json(value: Value) -> Result<FeatureRecord> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PipelineError::invalid_parameter(
            "record",
            other,
            "expected a JSON object of feature values",
        )),
    }
}
