//! Standard feature scaling

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Z-score scaler: `(x - mean) / std`, population std.
///
/// A column with (numerically) zero spread keeps a scale of 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    is_fitted: bool,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit on an imputed matrix; missing cells are not allowed here
    pub fn fit(&mut self, x: &Array2<f64>, columns: &[String]) -> Result<&mut Self> {
        if columns.len() != x.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        if x.nrows() == 0 {
            return Err(PipelineError::InsufficientData(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for column in x.axis_iter(Axis(1)) {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            let tiny = 10.0 * f64::EPSILON * m.abs().max(1.0);
            mean.push(m);
            scale.push(if std.is_finite() && std > tiny { std } else { 1.0 });
        }

        self.columns = columns.to_vec();
        self.mean = mean;
        self.scale = scale;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.mean.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} columns", self.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for ((mut column, &m), &s) in out
            .axis_iter_mut(Axis(1))
            .zip(&self.mean)
            .zip(&self.scale)
        {
            column.mapv_inplace(|v| (v - m) / s);
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

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}
