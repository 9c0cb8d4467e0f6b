//! Training configuration

use serde::{Deserialize, Serialize};

use super::random_forest::MaxFeatures;
use crate::error::{PipelineError, Result};

/// Hyperparameters for multinomial logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub max_iter: usize,
    pub learning_rate: f64,
    /// L2 regularization strength
    pub alpha: f64,
    pub tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.1,
            alpha: 1e-4,
            tol: 1e-6,
        }
    }
}

/// Hyperparameters for the RBF support vector classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvcConfig {
    /// Regularization parameter
    pub c: f64,
    /// RBF kernel coefficient; `None` uses `1 / (n_features * var(X))`
    pub gamma: Option<f64>,
    pub tol: f64,
    /// SMO passes without progress before stopping
    pub max_passes: usize,
    pub max_iter: usize,
    /// Fit Platt calibration so the model can produce probabilities
    pub probability: bool,
}

impl Default for SvcConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            tol: 1e-3,
            max_passes: 5,
            max_iter: 10_000,
            probability: true,
        }
    }
}

/// Hyperparameters for the random forest classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at each split: `"sqrt"`, `"log2"`, `"all"` or `{"fixed": n}`
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

/// Configuration for model training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the split and every estimator
    pub random_state: u64,
    pub logistic: LogisticConfig,
    pub svc: SvcConfig,
    pub forest: ForestConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            logistic: LogisticConfig::default(),
            svc: SvcConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.forest.n_estimators = n;
        self
    }

    /// Builder method to toggle SVC probability output
    pub fn with_svc_probability(mut self, enabled: bool) -> Self {
        self.svc.probability = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::invalid_parameter(
                "test_size",
                self.test_size,
                "must be in (0, 1)",
            ));
        }
        if self.logistic.max_iter == 0 {
            return Err(PipelineError::invalid_parameter(
                "logistic.max_iter",
                0,
                "must be positive",
            ));
        }
        if self.logistic.learning_rate <= 0.0 {
            return Err(PipelineError::invalid_parameter(
                "logistic.learning_rate",
                self.logistic.learning_rate,
                "must be positive",
            ));
        }
        if self.svc.c <= 0.0 {
            return Err(PipelineError::invalid_parameter(
                "svc.c",
                self.svc.c,
                "must be positive",
            ));
        }
        if let Some(gamma) = self.svc.gamma {
            if gamma <= 0.0 {
                return Err(PipelineError::invalid_parameter(
                    "svc.gamma",
                    gamma,
                    "must be positive",
                ));
            }
        }
        if self.svc.max_iter == 0 {
            return Err(PipelineError::invalid_parameter(
                "svc.max_iter",
                0,
                "must be positive",
            ));
        }
        if self.forest.n_estimators == 0 {
            return Err(PipelineError::invalid_parameter(
                "forest.n_estimators",
                0,
                "must be positive",
            ));
        }
        if self.forest.max_features == MaxFeatures::Fixed(0) {
            return Err(PipelineError::invalid_parameter(
                "forest.max_features",
                0,
                "must be positive",
            ));
        }
        if self.forest.min_samples_split < 2 {
            return Err(PipelineError::invalid_parameter(
                "forest.min_samples_split",
                self.forest.min_samples_split,
                "must be at least 2",
            ));
        }
        Ok(())
    }
}
