//! trainflow - CSV classification training and prediction
//!
//! Fits a preprocessing transform (imputation, categorical encoding,
//! scaling) and a fixed set of classifiers on a CSV table, persists
//! everything as JSON artifacts, and replays the exact transform to predict
//! single records later.
//!
//! # Modules
//!
//! - [`pipeline`] - `train_pipeline` / `predict_pipeline` over an artifact directory
//! - [`preprocessing`] - Imputer, category encoder, standard scaler
//! - [`training`] - Logistic regression, SVC, random forest, metrics
//! - [`calibration`] - Platt scaling for SVC probabilities
//! - [`inference`] - Single-record prediction from a saved model
//! - [`artifacts`] - On-disk artifact store, transactions and locks
//! - [`config`] - Serde-loadable pipeline configuration
//! - [`utils`] - CSV loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use trainflow::pipeline::Pipeline;
//! use trainflow::preprocessing::record_from_json;
//!
//! # fn main() -> trainflow::error::Result<()> {
//! let pipeline = Pipeline::default();
//! let report = pipeline.train_pipeline("churn.csv", "churn", "artifacts")?;
//! for (model, metrics) in report.metrics.iter() {
//!     println!("{model}: accuracy {:.3}", metrics.accuracy);
//! }
//!
//! let record = record_from_json(serde_json::json!({"age": 45, "income": 50000, "city": "A"}))?;
//! let result = pipeline.predict_pipeline(&record, "RandomForestClassifier", "artifacts")?;
//! println!("{} {:?}", result.prediction, result.probabilities);
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod preprocessing;
pub mod training;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, Result};
pub use inference::PredictionResult;
pub use pipeline::{ArtifactState, Pipeline};
pub use preprocessing::{FeatureRecord, Label};
pub use training::{EvaluationMetrics, ModelKind, TrainingReport};
