//! Training engine: split, fit every classifier, evaluate, persist

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use super::config::TrainingConfig;
use super::linear_models::LogisticRegression;
use super::models::{EvaluationMetrics, ModelKind};
use super::random_forest::RandomForest;
use super::svm::SupportVectorClassifier;
use crate::artifacts::{ArtifactName, ArtifactWriter};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{Label, TargetVector};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LogisticRegression(LogisticRegression),
    #[serde(rename = "SVC")]
    Svc(SupportVectorClassifier),
    RandomForestClassifier(RandomForest),
}

impl TrainedModel {
    /// Fit the estimator for `kind` on class indices
    pub fn fit(
        kind: ModelKind,
        config: &TrainingConfig,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Self> {
        let model = match kind {
            ModelKind::LogisticRegression => {
                let mut model = LogisticRegression::from_config(&config.logistic);
                model.fit(x, y)?;
                TrainedModel::LogisticRegression(model)
            }
            ModelKind::Svc => {
                let mut model = SupportVectorClassifier::new(config.svc.clone(), config.random_state);
                model.fit(x, y)?;
                TrainedModel::Svc(model)
            }
            ModelKind::RandomForestClassifier => {
                let mut model = RandomForest::from_config(&config.forest, config.random_state);
                model.fit(x, y)?;
                TrainedModel::RandomForestClassifier(model)
            }
        };
        Ok(model)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            TrainedModel::Svc(_) => ModelKind::Svc,
            TrainedModel::RandomForestClassifier(_) => ModelKind::RandomForestClassifier,
        }
    }

    /// Predicted class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LogisticRegression(m) => m.predict(x),
            TrainedModel::Svc(m) => m.predict(x),
            TrainedModel::RandomForestClassifier(m) => m.predict(x),
        }
    }

    /// Class probabilities, or `None` when the model cannot produce them
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        match self {
            TrainedModel::LogisticRegression(m) => m.predict_proba(x).map(Some),
            TrainedModel::Svc(m) => m.predict_proba(x),
            TrainedModel::RandomForestClassifier(m) => m.predict_proba(x).map(Some),
        }
    }
}

/// The persisted form of one trained classifier.
///
/// Carries the class labels so a prediction can be mapped back without
/// any other artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub model_name: String,
    /// Labels in class-index order
    pub classes: Vec<Label>,
    pub n_features: usize,
    pub model: TrainedModel,
}

impl ClassifierArtifact {
    /// Map predicted class indices back to labels
    pub fn labels(&self, indices: &Array1<f64>) -> Result<Vec<Label>> {
        labels_from_indices(&self.classes, indices)
    }
}

fn labels_from_indices(classes: &[Label], indices: &Array1<f64>) -> Result<Vec<Label>> {
    indices
        .iter()
        .map(|&idx| {
            classes.get(idx as usize).cloned().ok_or_else(|| {
                PipelineError::TrainingError(format!(
                    "predicted class index {} outside {} known classes",
                    idx,
                    classes.len()
                ))
            })
        })
        .collect()
}

/// Shuffle `0..n` with a seeded ChaCha8 stream and hold out the first
/// `ceil(test_size * n)` indices. Returns `(train, test)`.
pub fn train_test_split(n: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::invalid_parameter(
            "test_size",
            test_size,
            "must be in (0, 1)",
        ));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::InsufficientData(format!(
            "{} rows cannot be split with test_size {}",
            n, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Per-model metrics in training order; serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResults {
    entries: Vec<(String, EvaluationMetrics)>,
}

impl ModelResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: impl Into<String>, metrics: EvaluationMetrics) {
        self.entries.push((name.into(), metrics));
    }

    pub fn get(&self, name: &str) -> Option<&EvaluationMetrics> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EvaluationMetrics)> {
        self.entries.iter().map(|(n, m)| (n.as_str(), m))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ModelResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, metrics) in &self.entries {
            map.serialize_entry(name, metrics)?;
        }
        map.end()
    }
}

/// A classifier that could not be fitted or evaluated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelFailureRecord {
    pub model: String,
    pub error: String,
}

/// Outcome of one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub metrics: ModelResults,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ModelFailureRecord>,
    pub classes: Vec<Label>,
    pub n_train: usize,
    pub n_test: usize,
}

impl TrainingReport {
    /// Names of the models that were trained and persisted
    pub fn trained_models(&self) -> Vec<String> {
        self.metrics.keys().map(str::to_string).collect()
    }
}

/// Fits the fixed classifier set and persists each model
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Split, then fit, evaluate and save every [`ModelKind`] in order.
    ///
    /// A model that fails to fit is recorded in the report and the rest
    /// still train. Errors from `writer` propagate immediately.
    pub fn train(
        &self,
        x: &Array2<f64>,
        target: &TargetVector,
        writer: &mut impl ArtifactWriter,
    ) -> Result<TrainingReport> {
        if x.nrows() != target.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} target values", x.nrows()),
                actual: format!("{} target values", target.len()),
            });
        }

        let (train_idx, test_idx) =
            train_test_split(x.nrows(), self.config.test_size, self.config.random_state)?;

        let train_labels = target.select(&train_idx);
        let mut classes = train_labels.clone();
        classes.sort();
        classes.dedup();
        if classes.len() < 2 {
            warn!(target = %target.name(), classes = classes.len(), "Training split has a single class");
        }

        let y_train: Array1<f64> = train_labels
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default() as f64)
            .collect();
        let x_train = x.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = target.select(&test_idx);

        info!(
            train_rows = train_idx.len(),
            test_rows = test_idx.len(),
            classes = classes.len(),
            "Training classifiers"
        );

        let mut metrics = ModelResults::new();
        let mut failures = Vec::new();

        for kind in ModelKind::ALL {
            let span = info_span!("fit", model = %kind);
            let _enter = span.enter();
            let start = Instant::now();

            let outcome = TrainedModel::fit(kind, &self.config, &x_train, &y_train).and_then(|model| {
                let predicted = labels_from_indices(&classes, &model.predict(&x_test)?)?;
                Ok((model, predicted))
            });

            match outcome {
                Ok((model, predicted)) => {
                    let scores = EvaluationMetrics::compute(&y_test, &predicted);
                    let artifact = ClassifierArtifact {
                        model_name: kind.name().to_string(),
                        classes: classes.clone(),
                        n_features: x.ncols(),
                        model,
                    };
                    writer.save(ArtifactName::Model(kind), &artifact)?;
                    info!(
                        accuracy = scores.accuracy,
                        f1 = scores.f1_score,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Model trained"
                    );
                    metrics.insert(kind.name(), scores);
                }
                Err(e) => {
                    warn!(error = %e, "Model failed to train");
                    failures.push(ModelFailureRecord {
                        model: kind.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if metrics.is_empty() {
            let detail = failures
                .iter()
                .map(|f| format!("{}: {}", f.model, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(PipelineError::TrainingFailed(detail));
        }
        debug!(trained = metrics.len(), failed = failures.len(), "Training finished");

        Ok(TrainingReport {
            metrics,
            failures,
            classes,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryWriter {
        saved: HashMap<String, serde_json::Value>,
    }

    impl ArtifactWriter for MemoryWriter {
        fn save<T: Serialize>(&mut self, name: ArtifactName, value: &T) -> Result<()> {
            let json = serde_json::to_value(value).map_err(|e| PipelineError::Corrupt {
                path: name.file_name().into(),
                message: e.to_string(),
            })?;
            self.saved.insert(name.file_name(), json);
            Ok(())
        }
    }

    fn two_clusters(n: usize) -> (Array2<f64>, TargetVector) {
        let mut x = Array2::zeros((n, 2));
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let positive = i % 2 == 0;
            let offset = if positive { 2.0 } else { -2.0 };
            x[[i, 0]] = offset + (i as f64 * 0.37).sin() * 0.5;
            x[[i, 1]] = offset + (i as f64 * 0.91).cos() * 0.5;
            labels.push(Label::Bool(positive));
        }
        (x, TargetVector::new("label", labels))
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let (train, test) = train_test_split(10, 0.2, 42).unwrap();
        assert_eq!(test.len(), 2);
        assert_eq!(train.len(), 8);

        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rounds_up() {
        let (_, test) = train_test_split(11, 0.2, 0).unwrap();
        assert_eq!(test.len(), 3);
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(
            train_test_split(50, 0.2, 7).unwrap(),
            train_test_split(50, 0.2, 7).unwrap()
        );
        assert_ne!(
            train_test_split(50, 0.2, 7).unwrap(),
            train_test_split(50, 0.2, 8).unwrap()
        );
    }

    #[test]
    fn test_split_too_small() {
        assert!(matches!(
            train_test_split(1, 0.2, 0),
            Err(PipelineError::InsufficientData(_))
        ));
        assert!(train_test_split(10, 1.0, 0).is_err());
    }

    #[test]
    fn test_trains_all_models_in_order() {
        let (x, target) = two_clusters(40);
        let config = TrainingConfig::default().with_n_estimators(10);
        let mut writer = MemoryWriter::default();

        let report = ModelTrainer::new(config).train(&x, &target, &mut writer).unwrap();

        let names: Vec<&str> = report.metrics.keys().collect();
        assert_eq!(names, vec!["LogisticRegression", "SVC", "RandomForestClassifier"]);
        assert!(report.failures.is_empty());
        assert_eq!(report.n_test, 8);
        assert_eq!(report.classes, vec![Label::Bool(false), Label::Bool(true)]);

        for (_, m) in report.metrics.iter() {
            assert!(m.accuracy > 0.8);
        }
        for file in ["LogisticRegression.json", "SVC.json", "RandomForestClassifier.json"] {
            assert!(writer.saved.contains_key(file), "{} not saved", file);
        }
    }

    #[test]
    fn test_single_class_training_split() {
        let x = Array2::zeros((10, 1));
        let target = TargetVector::new("y", vec![Label::Int(1); 10]);
        let err = ModelTrainer::default()
            .train(&x, &target, &mut MemoryWriter::default())
            .unwrap_err();
        match err {
            PipelineError::TrainingFailed(detail) => {
                for kind in ModelKind::ALL {
                    assert!(detail.contains(kind.name()), "{} missing from '{}'", kind, detail);
                }
            }
            other => panic!("expected TrainingFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_model_is_isolated() {
        // one more training row than the kernel matrix allows
        let n = 12_600;
        let (x, target) = two_clusters(n);
        let mut config = TrainingConfig::default().with_n_estimators(3);
        config.forest.max_depth = Some(6);
        let mut writer = MemoryWriter::default();

        let report = ModelTrainer::new(config).train(&x, &target, &mut writer).unwrap();

        assert_eq!(report.n_train, 10_080);
        assert_eq!(report.trained_models(), vec!["LogisticRegression", "RandomForestClassifier"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].model, "SVC");
        assert!(report.failures[0].error.contains("10080"));
        assert!(!writer.saved.contains_key("SVC.json"));
        assert!(writer.saved.contains_key("LogisticRegression.json"));
    }

    #[test]
    fn test_results_serialize_in_order() {
        let m = EvaluationMetrics {
            accuracy: 1.0,
            precision: 1.0,
            recall: 1.0,
            f1_score: 1.0,
            mse: 0.0,
        };
        let mut results = ModelResults::new();
        results.insert("b", m);
        results.insert("a", m);
        let json = serde_json::to_string(&results).unwrap();
        assert!(json.find("\"b\"").unwrap() < json.find("\"a\"").unwrap());
        assert_eq!(results.get("a"), Some(&m));
    }

    #[test]
    fn test_artifact_round_trip_predicts() {
        let (x, target) = two_clusters(30);
        let mut writer = MemoryWriter::default();
        ModelTrainer::new(TrainingConfig::default().with_n_estimators(5))
            .train(&x, &target, &mut writer)
            .unwrap();

        let json = writer.saved["RandomForestClassifier.json"].clone();
        let artifact: ClassifierArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(artifact.n_features, 2);
        let indices = artifact.model.predict(&x).unwrap();
        let labels = artifact.labels(&indices).unwrap();
        assert_eq!(labels.len(), 30);
    }
}
