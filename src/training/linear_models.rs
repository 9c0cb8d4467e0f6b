//! Linear classifiers

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::LogisticConfig;
use super::models::{check_samples, n_classes};
use crate::error::{PipelineError, Result};

/// Multinomial logistic regression trained by full-batch gradient descent
/// with L2 regularization. Two classes reduce to ordinary logistic
/// regression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted weights, one column per class
    pub coefficients: Option<Array2<f64>>,
    /// Fitted intercepts, one per class
    pub intercept: Option<Array1<f64>>,
    /// Regularization strength (L2)
    pub alpha: f64,
    pub max_iter: usize,
    /// Convergence tolerance on the gradient norm
    pub tol: f64,
    pub learning_rate: f64,
    pub is_fitted: bool,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::from_config(&LogisticConfig::default())
    }

    pub fn from_config(config: &LogisticConfig) -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: config.alpha,
            max_iter: config.max_iter,
            tol: config.tol,
            learning_rate: config.learning_rate,
            is_fitted: false,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Row-wise softmax, shifted by the row max for stability
    fn softmax(mut logits: Array2<f64>) -> Array2<f64> {
        for mut row in logits.axis_iter_mut(Axis(0)) {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        logits
    }

    /// Fit on class indices `0..k`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_samples(x.nrows(), y.len())?;
        let n_samples = x.nrows();
        let k = n_classes(y)?;

        let mut onehot = Array2::<f64>::zeros((n_samples, k));
        for (i, &label) in y.iter().enumerate() {
            onehot[[i, label as usize]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((x.ncols(), k));
        let mut bias = Array1::<f64>::zeros(k);
        let lr = self.learning_rate;
        let alpha = self.alpha;

        let mut iterations = 0;
        for _ in 0..self.max_iter {
            iterations += 1;
            let probs = Self::softmax(x.dot(&weights) + &bias);
            let errors = probs - &onehot;

            let dw = x.t().dot(&errors) / n_samples as f64 + alpha * &weights;
            let db = errors.sum_axis(Axis(0)) / n_samples as f64;

            let grad_norm = (dw.mapv(|v| v * v).sum() + db.mapv(|v| v * v).sum()).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - lr * dw;
            bias = bias - lr * db;
        }
        debug!(iterations, classes = k, "Logistic regression converged");

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.is_fitted = true;
        Ok(self)
    }

    /// Class probabilities, one column per class
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (coefficients, intercept) = match (&self.coefficients, &self.intercept) {
            (Some(w), Some(b)) if self.is_fitted => (w, b),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        if x.ncols() != coefficients.nrows() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.nrows()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(Self::softmax(x.dot(coefficients) + intercept))
    }

    /// Most probable class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(argmax_rows(&proba))
    }
}

/// Column index of each row's maximum; first index wins ties
pub(crate) fn argmax_rows(scores: &Array2<f64>) -> Array1<f64> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (j, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = j;
                }
            }
            best as f64
        })
        .collect()
}
