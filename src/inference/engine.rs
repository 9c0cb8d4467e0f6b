//! Single-record prediction against a persisted classifier

use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifacts::load_json;
use crate::error::{PipelineError, Result};
use crate::preprocessing::Label;
use crate::training::ClassifierArtifact;

/// Prediction for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// One of the labels seen in training
    pub prediction: Label,
    /// Probability per class in `classes` order; empty when the model
    /// cannot estimate probabilities
    pub probabilities: Vec<f64>,
    pub classes: Vec<Label>,
}

impl PredictionResult {
    pub fn has_probabilities(&self) -> bool {
        !self.probabilities.is_empty()
    }
}

/// Loads a persisted classifier and predicts one prepared row
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionRunner;

impl PredictionRunner {
    pub fn new() -> Self {
        Self
    }

    /// Load the classifier artifact at `model_path`.
    /// A missing file is `ArtifactNotFound`.
    pub fn load_model(&self, model_path: &Path) -> Result<ClassifierArtifact> {
        load_json(model_path)
    }

    /// Predict the single row in `x` with the model stored at `model_path`
    pub fn predict(&self, model_path: &Path, x: &Array2<f64>) -> Result<PredictionResult> {
        let artifact = self.load_model(model_path)?;
        self.predict_with(&artifact, x)
    }

    /// Predict with an already loaded artifact
    pub fn predict_with(&self, artifact: &ClassifierArtifact, x: &Array2<f64>) -> Result<PredictionResult> {
        if x.nrows() != 1 {
            return Err(PipelineError::ShapeError {
                expected: "1 row".to_string(),
                actual: format!("{} rows", x.nrows()),
            });
        }
        if x.ncols() != artifact.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", artifact.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let indices = artifact.model.predict(x)?;
        let prediction = artifact
            .labels(&indices)?
            .into_iter()
            .next()
            .ok_or(PipelineError::ModelNotFitted)?;

        let probabilities = match artifact.model.predict_proba(x)? {
            Some(proba) if proba.ncols() == artifact.classes.len() => proba.row(0).to_vec(),
            Some(proba) => {
                return Err(PipelineError::ShapeError {
                    expected: format!("{} class probabilities", artifact.classes.len()),
                    actual: format!("{} class probabilities", proba.ncols()),
                })
            }
            None => {
                debug!(model = %artifact.model_name, "Model has no probability output");
                Vec::new()
            }
        };

        Ok(PredictionResult {
            prediction,
            probabilities,
            classes: artifact.classes.clone(),
        })
    }
}
