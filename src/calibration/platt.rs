//! Platt scaling (sigmoid calibration)

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::Calibrator;
use crate::error::{PipelineError, Result};

/// Platt scaling calibrator
///
/// Fits `P(y=1|f) = 1 / (1 + exp(-(a*f + b)))` on decision values `f`,
/// using Platt's smoothed targets and Newton steps with backtracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    a: Option<f64>,
    b: Option<f64>,
    max_iter: usize,
    tol: f64,
}

impl PlattScaling {
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-10,
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Get fitted parameters
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn sigmoid(x: f64) -> f64 {
        if x >= 0.0 {
            1.0 / (1.0 + (-x).exp())
        } else {
            let e = x.exp();
            e / (1.0 + e)
        }
    }

    /// Cross-entropy of the smoothed targets under `(a, b)`
    fn loss(scores: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
        scores
            .iter()
            .zip(targets)
            .map(|(&f, &t)| {
                let z = a * f + b;
                // log(1 + exp(z)) - t*z, stable for large |z|
                let softplus = if z > 0.0 {
                    z + (-z).exp().ln_1p()
                } else {
                    z.exp().ln_1p()
                };
                softplus - t * z
            })
            .sum()
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

impl Calibrator for PlattScaling {
    fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", n),
                actual: format!("{} labels", labels.len()),
            });
        }
        if n == 0 {
            return Err(PipelineError::InsufficientData(
                "cannot calibrate on zero samples".to_string(),
            ));
        }

        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);

        let f: Vec<f64> = scores.to_vec();
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut current = Self::loss(&f, &targets, a, b);

        for _ in 0..self.max_iter {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            let mut hess_aa = 1e-12;
            let mut hess_ab = 0.0;
            let mut hess_bb = 1e-12;

            for (&fi, &t) in f.iter().zip(&targets) {
                let p = Self::sigmoid(a * fi + b);
                let d1 = p - t;
                let d2 = p * (1.0 - p);
                grad_a += fi * d1;
                grad_b += d1;
                hess_aa += fi * fi * d2;
                hess_ab += fi * d2;
                hess_bb += d2;
            }

            if grad_a.abs() < 1e-5 && grad_b.abs() < 1e-5 {
                break;
            }

            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-300 {
                break;
            }
            let delta_a = -(hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = -(hess_aa * grad_b - hess_ab * grad_a) / det;
            let slope = grad_a * delta_a + grad_b * delta_b;

            let mut step = 1.0;
            let mut improved = false;
            while step >= 1e-10 {
                let (na, nb) = (a + step * delta_a, b + step * delta_b);
                let candidate = Self::loss(&f, &targets, na, nb);
                if candidate < current + 1e-4 * step * slope {
                    a = na;
                    b = nb;
                    current = candidate;
                    improved = true;
                    break;
                }
                step /= 2.0;
            }
            if !improved || (step * delta_a).abs() + (step * delta_b).abs() < self.tol {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(PipelineError::ModelNotFitted)?;
        Ok(scores.mapv(|f| Self::sigmoid(a * f + b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_platt_monotone_in_score() {
        let scores = array![-2.0, -1.2, -0.4, 0.3, -0.1, 1.1, 1.7, 2.4];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];

        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();
        let (a, _) = calibrator.parameters().unwrap();
        assert!(a > 0.0);

        let probs = calibrator.calibrate(&array![-3.0, 0.0, 3.0]).unwrap();
        assert!(probs[0] < probs[1] && probs[1] < probs[2]);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_separable_scores_stay_finite() {
        let scores = array![-1.0, -1.0, 1.0, 1.0];
        let labels = array![0.0, 0.0, 1.0, 1.0];
        let mut calibrator = PlattScaling::new();
        calibrator.fit(&scores, &labels).unwrap();
        let (a, b) = calibrator.parameters().unwrap();
        assert!(a.is_finite() && b.is_finite());
        // smoothed targets cap the fitted confidence
        let p = calibrator.calibrate(&array![1.0]).unwrap()[0];
        assert!(p < 0.9);
    }

    #[test]
    fn test_not_fitted() {
        let calibrator = PlattScaling::new();
        assert!(calibrator.calibrate(&array![0.0]).is_err());
    }
}
