//! Support vector classification
//!
//! RBF-kernel SVC trained with SMO (Sequential Minimal Optimization).
//! More than two classes are handled one-vs-rest; probabilities come from
//! Platt scaling of each machine's decision values.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::SvcConfig;
use super::linear_models::argmax_rows;
use super::models::{check_samples, n_classes};
use crate::calibration::{Calibrator, PlattScaling};
use crate::error::{PipelineError, Result};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error instead of exhausting memory.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * sq).exp()
}

/// One binary machine: positive class against everything else
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryMachine {
    support_vectors: Array2<f64>,
    /// `alpha_i * y_i` per support vector
    dual_coef: Array1<f64>,
    bias: f64,
    calibrator: Option<PlattScaling>,
}

impl BinaryMachine {
    fn decision(&self, sample: ArrayView1<f64>, gamma: f64) -> f64 {
        self.support_vectors
            .axis_iter(Axis(0))
            .zip(self.dual_coef.iter())
            .map(|(sv, &coef)| coef * rbf(sv, sample, gamma))
            .sum::<f64>()
            + self.bias
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    config: SvcConfig,
    random_state: u64,
    /// Kernel coefficient resolved at fit time
    gamma: f64,
    n_classes: usize,
    n_features: usize,
    machines: Vec<BinaryMachine>,
    is_fitted: bool,
}

impl SupportVectorClassifier {
    pub fn new(config: SvcConfig, random_state: u64) -> Self {
        Self {
            config,
            random_state,
            gamma: 0.0,
            n_classes: 0,
            n_features: 0,
            machines: Vec::new(),
            is_fitted: false,
        }
    }

    /// Whether `predict_proba` can produce probabilities
    pub fn has_probability(&self) -> bool {
        self.config.probability
    }

    /// Fit on class indices `0..k`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_samples(x.nrows(), y.len())?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PipelineError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVC kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        let k = n_classes(y)?;

        self.gamma = match self.config.gamma {
            Some(gamma) => gamma,
            None => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        };

        let kernel = self.kernel_matrix(x)?;
        let positives: Vec<usize> = if k == 2 { vec![1] } else { (0..k).collect() };

        self.machines = positives
            .into_iter()
            .map(|class| {
                let y_binary = y.mapv(|v| if v as usize == class { 1.0 } else { -1.0 });
                self.train_machine(x, &y_binary, &kernel)
            })
            .collect::<Result<Vec<_>>>()?;

        self.n_classes = k;
        self.n_features = x.ncols();
        self.is_fitted = true;
        Ok(self)
    }

    fn train_machine(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        kernel: &Array2<f64>,
    ) -> Result<BinaryMachine> {
        let (alphas, bias) = self.smo(y, kernel);

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = alphas[idx] * y[idx];
        }

        let calibrator = if self.config.probability {
            // in-sample decision values from the cached kernel
            let scores: Array1<f64> = (0..x.nrows())
                .map(|j| {
                    support
                        .iter()
                        .zip(dual_coef.iter())
                        .map(|(&i, &coef)| coef * kernel[[i, j]])
                        .sum::<f64>()
                        + bias
                })
                .collect();
            let labels = y.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
            let mut platt = PlattScaling::new();
            platt.fit(&scores, &labels)?;
            Some(platt)
        } else {
            None
        };

        debug!(support_vectors = support.len(), "Trained SVC machine");
        Ok(BinaryMachine {
            support_vectors,
            dual_coef,
            bias,
            calibrator,
        })
    }

    /// SMO over a precomputed kernel; labels are +1 / -1
    fn smo(&self, y: &Array1<f64>, kernel: &Array2<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        if n <= 1 {
            return (alphas, bias);
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state);
        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * kernel[[i, idx]];
                }
            }
            sum
        };

        let mut passes = 0;
        let mut total_iter = 0;
        while passes < self.config.max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * kernel[[i, j]] - kernel[[i, i]] - kernel[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, i]]
                    - y[j] * (alphas[j] - alpha_j_old) * kernel[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, j]]
                    - y[j] * (alphas[j] - alpha_j_old) * kernel[[j, j]];

                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };
                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    /// Full kernel matrix, rows computed in parallel
    fn kernel_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        let gamma = self.gamma;
        let values: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| (0..n).map(move |j| rbf(x.row(i), x.row(j), gamma)))
            .collect();
        Ok(Array2::from_shape_vec((n, n), values)?)
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(())
    }

    /// Raw decision values, one column per machine
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_input(x)?;
        let mut scores = Array2::zeros((x.nrows(), self.machines.len()));
        for (i, sample) in x.axis_iter(Axis(0)).enumerate() {
            for (m, machine) in self.machines.iter().enumerate() {
                scores[[i, m]] = machine.decision(sample, self.gamma);
            }
        }
        Ok(scores)
    }

    /// Predicted class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;
        if self.n_classes == 2 {
            Ok(scores.column(0).mapv(|s| if s >= 0.0 { 1.0 } else { 0.0 }))
        } else {
            Ok(argmax_rows(&scores))
        }
    }

    /// Calibrated class probabilities, `None` when trained without them
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        if !self.config.probability {
            return Ok(None);
        }
        let scores = self.decision_function(x)?;
        let mut calibrated = Array2::zeros(scores.dim());
        for (m, machine) in self.machines.iter().enumerate() {
            let platt = machine
                .calibrator
                .as_ref()
                .ok_or(PipelineError::ModelNotFitted)?;
            calibrated
                .column_mut(m)
                .assign(&platt.calibrate(&scores.column(m).to_owned())?);
        }

        if self.n_classes == 2 {
            let positive = calibrated.column(0).to_owned();
            let mut proba = Array2::zeros((x.nrows(), 2));
            proba.column_mut(0).assign(&positive.mapv(|p| 1.0 - p));
            proba.column_mut(1).assign(&positive);
            return Ok(Some(proba));
        }

        for mut row in calibrated.axis_iter_mut(Axis(0)) {
            let sum = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|p| p / sum);
            } else {
                row.fill(1.0 / self.n_classes as f64);
            }
        }
        Ok(Some(calibrated))
    }

    /// Total support vectors across machines
    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0, -2.0],
            [-1.8, -2.2],
            [-2.2, -1.7],
            [-1.5, -1.9],
            [2.0, 2.0],
            [1.8, 2.3],
            [2.2, 1.9],
            [1.6, 2.1]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_binary_fit_predict() {
        let (x, y) = blobs();
        let mut svc = SupportVectorClassifier::new(SvcConfig::default(), 42);
        svc.fit(&x, &y).unwrap();

        assert_eq!(svc.predict(&x).unwrap(), y);
        assert!(svc.n_support_vectors() > 0);

        let proba = svc.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.dim(), (8, 2));
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert!(proba[[0, 0]] > proba[[0, 1]]);
        assert!(proba[[7, 1]] > proba[[7, 0]]);
    }

    #[test]
    fn test_one_vs_rest() {
        let x = array![
            [0.0, 4.0],
            [0.3, 4.2],
            [4.0, 0.0],
            [4.1, 0.4],
            [-4.0, -4.0],
            [-4.2, -3.8]
        ];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut svc = SupportVectorClassifier::new(SvcConfig::default(), 7);
        svc.fit(&x, &y).unwrap();

        assert_eq!(svc.predict(&x).unwrap(), y);
        let proba = svc.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_without_probability() {
        let (x, y) = blobs();
        let config = SvcConfig {
            probability: false,
            ..SvcConfig::default()
        };
        let mut svc = SupportVectorClassifier::new(config, 42);
        svc.fit(&x, &y).unwrap();
        assert!(!svc.has_probability());
        assert!(svc.predict_proba(&x).unwrap().is_none());
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = blobs();
        let mut a = SupportVectorClassifier::new(SvcConfig::default(), 3);
        let mut b = SupportVectorClassifier::new(SvcConfig::default(), 3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.decision_function(&x).unwrap(), b.decision_function(&x).unwrap());
    }

    #[test]
    fn test_not_fitted() {
        let svc = SupportVectorClassifier::new(SvcConfig::default(), 0);
        assert!(matches!(
            svc.predict(&array![[0.0, 0.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
