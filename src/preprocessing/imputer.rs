//! Mean imputation for missing feature values

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Replaces missing cells (NaN) with the column's training mean.
///
/// Categorical columns arrive here already encoded, so their fill value is
/// the mean category code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    columns: Vec<String>,
    fill_values: Vec<f64>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn per-column means, ignoring missing cells
    pub fn fit(&mut self, x: &Array2<f64>, columns: &[String]) -> Result<&mut Self> {
        if columns.len() != x.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        self.fill_values = x
            .axis_iter(Axis(1))
            .zip(columns)
            .map(|(column, name)| {
                let (sum, count) = column
                    .iter()
                    .filter(|v| v.is_finite())
                    .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
                if count == 0 {
                    warn!(column = %name, "Column has no observed values, imputing 0.0");
                    0.0
                } else {
                    sum / count as f64
                }
            })
            .collect();
        self.columns = columns.to_vec();
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.fill_values.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", self.fill_values.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (mut column, &fill) in out.axis_iter_mut(Axis(1)).zip(&self.fill_values) {
            column.mapv_inplace(|v| if v.is_nan() { fill } else { v });
        }
        Ok(out)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>, columns: &[String]) -> Result<Array2<f64>> {
        self.fit(x, columns)?;
        self.transform(x)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn fill_values(&self) -> &[f64] {
        &self.fill_values
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
