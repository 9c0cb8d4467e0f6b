//! Model identifiers and evaluation metrics

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::preprocessing::Label;

/// The fixed set of classifiers trained on every run, in training order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    #[serde(rename = "SVC")]
    Svc,
    RandomForestClassifier,
}

impl ModelKind {
    /// Linear, kernel, ensemble
    pub const ALL: [ModelKind; 3] = [
        ModelKind::LogisticRegression,
        ModelKind::Svc,
        ModelKind::RandomForestClassifier,
    ];

    /// Artifact and report name
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LogisticRegression => "LogisticRegression",
            ModelKind::Svc => "SVC",
            ModelKind::RandomForestClassifier => "RandomForestClassifier",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Held-out evaluation of one trained classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F1
    pub f1_score: f64,
    /// Mean squared error over numeric labels
    pub mse: f64,
}

impl EvaluationMetrics {
    /// Compute every metric. Undefined metrics fall back to 0.0.
    pub fn compute(y_true: &[Label], y_pred: &[Label]) -> Self {
        let accuracy = accuracy_score(y_true, y_pred);

        let (precision, recall, f1_score) = weighted_precision_recall_f1(y_true, y_pred)
            .unwrap_or_else(|e| {
                debug!(error = %e, "Defaulting precision/recall/f1 to 0.0");
                (0.0, 0.0, 0.0)
            });

        let mse = mean_squared_error(y_true, y_pred).unwrap_or_else(|e| {
            debug!(error = %e, "Defaulting mse to 0.0");
            0.0
        });

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
            mse,
        }
    }
}

/// Fraction of exact label matches; 0.0 on empty input
pub fn accuracy_score(y_true: &[Label], y_pred: &[Label]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Precision, recall and F1 averaged over the labels present in either
/// input, weighted by true support. A class with an empty denominator
/// contributes 0.0.
///
/// Fails with `DegenerateMetric` when `y_true` holds fewer than two classes.
pub fn weighted_precision_recall_f1(y_true: &[Label], y_pred: &[Label]) -> Result<(f64, f64, f64)> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }

    let mut true_classes: Vec<&Label> = y_true.iter().collect();
    true_classes.sort();
    true_classes.dedup();
    if true_classes.len() < 2 {
        return Err(PipelineError::DegenerateMetric {
            metric: "precision/recall/f1",
            reason: format!("held-out labels contain {} class(es)", true_classes.len()),
        });
    }

    // per label: (true positives, predicted count, support)
    let mut counts: BTreeMap<&Label, (usize, usize, usize)> = BTreeMap::new();
    for (t, p) in y_true.iter().zip(y_pred) {
        counts.entry(t).or_default().2 += 1;
        counts.entry(p).or_default().1 += 1;
        if t == p {
            counts.entry(t).or_default().0 += 1;
        }
    }

    let total = y_true.len() as f64;
    let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
    for &(tp, predicted, support) in counts.values() {
        if support == 0 {
            continue;
        }
        let p = if predicted > 0 { tp as f64 / predicted as f64 } else { 0.0 };
        let r = tp as f64 / support as f64;
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        let weight = support as f64 / total;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }
    Ok((precision, recall, f1))
}

/// Mean squared error over numeric labels.
///
/// Text labels have no numeric meaning and yield `DegenerateMetric`.
pub fn mean_squared_error(y_true: &[Label], y_pred: &[Label]) -> Result<f64> {
    if y_true.is_empty() {
        return Err(PipelineError::DegenerateMetric {
            metric: "mse",
            reason: "no samples".to_string(),
        });
    }
    let mut sum = 0.0;
    for (t, p) in y_true.iter().zip(y_pred) {
        match (t.as_f64(), p.as_f64()) {
            (Some(t), Some(p)) => sum += (t - p).powi(2),
            _ => {
                return Err(PipelineError::DegenerateMetric {
                    metric: "mse",
                    reason: format!("non-numeric labels ({}, {})", t, p),
                })
            }
        }
    }
    Ok(sum / y_true.len() as f64)
}

/// Number of classes encoded in `y`, whose entries must be class indices
/// `0..k`. At least two distinct classes are required.
pub(crate) fn n_classes(y: &Array1<f64>) -> Result<usize> {
    let mut seen: Vec<usize> = Vec::new();
    for (i, &v) in y.iter().enumerate() {
        if v < 0.0 || v.fract() != 0.0 || !v.is_finite() {
            return Err(PipelineError::TrainingError(format!(
                "sample {} has label {}, expected a class index",
                i, v
            )));
        }
        seen.push(v as usize);
    }
    seen.sort_unstable();
    seen.dedup();
    if seen.len() < 2 {
        return Err(PipelineError::TrainingError(
            "classifier requires at least 2 distinct classes".to_string(),
        ));
    }
    Ok(seen.last().map(|&m| m + 1).unwrap_or(0))
}

pub(crate) fn check_samples(n_rows: usize, y_len: usize) -> Result<()> {
    if n_rows != y_len {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", n_rows),
            actual: format!("y length = {}", y_len),
        });
    }
    if n_rows == 0 {
        return Err(PipelineError::InsufficientData(
            "cannot fit on zero samples".to_string(),
        ));
    }
    Ok(())
}
