//! Probability calibration
//!
//! Maps raw classifier scores onto probabilities. Used by the SVC, whose
//! decision values carry no probabilistic meaning on their own.

mod platt;

pub use platt::PlattScaling;

use ndarray::Array1;

use crate::error::Result;

/// Trait for score calibrators
pub trait Calibrator: Send + Sync {
    /// Fit on raw scores and binary labels (1.0 = positive)
    fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class for each score
    fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>>;
}
