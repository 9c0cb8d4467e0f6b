//! Integration test: ModelTrainer, estimators and metrics

use ndarray::{Array1, Array2};
use trainflow::artifacts::{ArtifactName, ArtifactStore};
use trainflow::error::PipelineError;
use trainflow::preprocessing::{Label, TargetVector};
use trainflow::training::{
    weighted_precision_recall_f1, ClassifierArtifact, EvaluationMetrics, ModelKind, ModelTrainer,
    RandomForest, TrainingConfig,
};

/// Three well separated clusters labelled by text
fn three_blobs(per_class: usize) -> (Array2<f64>, TargetVector) {
    let centers = [(-4.0, 0.0), (4.0, 0.0), (0.0, 5.0)];
    let names = ["low", "high", "top"];
    let n = per_class * centers.len();
    let mut x = Array2::zeros((n, 2));
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let c = i % centers.len();
        x[[i, 0]] = centers[c].0 + (i as f64 * 1.3).sin() * 0.6;
        x[[i, 1]] = centers[c].1 + (i as f64 * 0.7).cos() * 0.6;
        labels.push(Label::Text(names[c].to_string()));
    }
    (x, TargetVector::new("segment", labels))
}

fn fast_config() -> TrainingConfig {
    TrainingConfig::default().with_n_estimators(15)
}

#[test]
fn test_trainer_persists_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path());
    let (x, target) = three_blobs(20);

    let mut txn = store.begin_write().unwrap();
    let report = ModelTrainer::new(fast_config())
        .train(&x, &target, &mut txn)
        .unwrap();
    txn.commit().unwrap();

    let keys: Vec<&str> = report.metrics.keys().collect();
    assert_eq!(keys, vec!["LogisticRegression", "SVC", "RandomForestClassifier"]);
    assert_eq!(report.n_train + report.n_test, 60);
    assert_eq!(report.n_test, 12);
    assert_eq!(report.classes.len(), 3);

    for kind in ModelKind::ALL {
        let artifact: ClassifierArtifact = store.load(ArtifactName::Model(kind)).unwrap();
        assert_eq!(artifact.model_name, kind.name());
        assert_eq!(artifact.n_features, 2);
        assert_eq!(artifact.classes, report.classes);
        assert_eq!(artifact.model.kind(), kind);

        let proba = artifact.model.predict_proba(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 3);
    }
}

#[test]
fn test_metrics_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path());
    let (x, target) = three_blobs(20);
    let mut txn = store.begin_write().unwrap();
    let report = ModelTrainer::new(fast_config())
        .train(&x, &target, &mut txn)
        .unwrap();

    for (name, m) in report.metrics.iter() {
        for value in [m.accuracy, m.precision, m.recall, m.f1_score] {
            assert!((0.0..=1.0).contains(&value), "{} metric out of range: {}", name, value);
        }
        assert_eq!(m.mse, 0.0, "text labels have no squared error");
        assert!(m.accuracy > 0.9, "{} should separate the blobs", name);
    }
}

#[test]
fn test_training_is_deterministic() {
    let (x, target) = three_blobs(15);
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path());
        let mut txn = store.begin_write().unwrap();
        let report = ModelTrainer::new(fast_config())
            .train(&x, &target, &mut txn)
            .unwrap();
        txn.commit().unwrap();
        let forest = store
            .read_bytes(&ArtifactName::Model(ModelKind::RandomForestClassifier).file_name())
            .unwrap();
        (report.metrics, forest)
    };

    let (metrics_a, forest_a) = run();
    let (metrics_b, forest_b) = run();
    assert_eq!(metrics_a, metrics_b);
    assert_eq!(forest_a, forest_b, "same seed should give the same forest");
}

#[test]
fn test_uncommitted_training_leaves_no_models() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path());
    let (x, target) = three_blobs(10);
    {
        let mut txn = store.begin_write().unwrap();
        ModelTrainer::new(fast_config())
            .train(&x, &target, &mut txn)
            .unwrap();
        // dropped without commit
    }
    for kind in ModelKind::ALL {
        assert!(!store.exists(ArtifactName::Model(kind)));
    }
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_mismatched_target_length() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path());
    let (x, _) = three_blobs(10);
    let target = TargetVector::new("y", vec![Label::Int(0), Label::Int(1)]);
    let mut txn = store.begin_write().unwrap();

    let err = ModelTrainer::default()
        .train(&x, &target, &mut txn)
        .unwrap_err();
    assert!(matches!(err, PipelineError::ShapeError { .. }));
}

#[test]
fn test_single_class_test_split_scores_zero() {
    let y_true = vec![Label::Int(1); 4];
    let y_pred = vec![Label::Int(1), Label::Int(0), Label::Int(1), Label::Int(1)];

    assert!(matches!(
        weighted_precision_recall_f1(&y_true, &y_pred),
        Err(PipelineError::DegenerateMetric { .. })
    ));

    let m = EvaluationMetrics::compute(&y_true, &y_pred);
    assert_eq!(m.accuracy, 0.75);
    assert_eq!((m.precision, m.recall, m.f1_score), (0.0, 0.0, 0.0));
    assert_eq!(m.mse, 0.25);
}

#[test]
fn test_forest_probabilities_sum_to_one() {
    let (x, target) = three_blobs(10);
    let classes = target.classes();
    let y: Array1<f64> = target
        .values()
        .iter()
        .map(|l| classes.binary_search(l).unwrap() as f64)
        .collect();

    let mut forest = RandomForest::from_config(&fast_config().forest, 3);
    forest.fit(&x, &y).unwrap();
    let proba = forest.predict_proba(&x).unwrap();
    for row in proba.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-9);
    }
}
