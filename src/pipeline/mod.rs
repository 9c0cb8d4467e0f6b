//! End-to-end training and prediction flows over an artifact directory
//!
//! A [`Pipeline`] carries the configuration and the per-directory lock
//! registry. Every call names its artifact directory explicitly; there is
//! no process-wide "current model".
//!
//! Directory lifecycle: a directory without `manifest.json` is Untrained.
//! A successful [`Pipeline::train_pipeline`] commits a complete artifact set
//! and makes it Trained; retraining replaces the whole set.

use std::path::Path;

use tracing::{debug, info};

use crate::artifacts::{
    ArtifactInfo, ArtifactName, ArtifactStore, ArtifactWriter, DirectoryLocks, Manifest,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::inference::{PredictionResult, PredictionRunner};
use crate::preprocessing::{FeatureRecord, Preprocessor};
use crate::training::{ModelTrainer, TrainingReport};
use crate::utils::{DataLoader, DataSource};

/// Observable state of one artifact directory
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactState {
    Untrained,
    Trained(Manifest),
}

impl ArtifactState {
    pub fn is_trained(&self) -> bool {
        matches!(self, ArtifactState::Trained(_))
    }
}

/// Training/prediction service
#[derive(Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    locks: DirectoryLocks,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            locks: DirectoryLocks::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Store handle for `dir` that shares this pipeline's lock for it
    pub fn store(&self, dir: impl AsRef<Path>) -> ArtifactStore {
        let dir = dir.as_ref();
        ArtifactStore::with_lock(dir, self.locks.lock_for(dir))
    }

    fn preprocessor(&self) -> Preprocessor {
        Preprocessor::with_config(self.config.preprocessing.clone())
    }

    /// Read `source`, fit preprocessing and every classifier, and commit the
    /// artifacts to `dir`.
    ///
    /// Holds the directory's write lock throughout. On any error the
    /// directory keeps its previous artifacts.
    pub fn train_pipeline(
        &self,
        source: impl Into<DataSource>,
        target: &str,
        dir: impl AsRef<Path>,
    ) -> Result<TrainingReport> {
        self.config.validate()?;
        let source = source.into();
        let dir = dir.as_ref();
        info!(source = %source.describe(), target = %target, dir = %dir.display(), "Starting training");

        let table = DataLoader::new().load(&source)?;
        let feature_names: Vec<String> = table
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .filter(|name| name != target)
            .collect();
        if feature_names.len() == table.width() {
            return Err(PipelineError::TargetNotFound {
                target: target.to_string(),
                available: feature_names,
            });
        }

        let store = self.store(dir);
        let mut txn = store.begin_write()?;

        let (x, y) = self.preprocessor().fit(&table, target, &mut txn)?;
        let report = ModelTrainer::new(self.config.training.clone()).train(&x, &y, &mut txn)?;

        let manifest = Manifest::new(
            target,
            report.classes.clone(),
            feature_names,
            report.trained_models(),
        );
        txn.save(ArtifactName::Manifest, &manifest)?;
        let committed = txn.commit()?;

        info!(
            dir = %dir.display(),
            models = report.metrics.len(),
            failed = report.failures.len(),
            artifacts = committed.len(),
            "Training complete"
        );
        Ok(report)
    }

    /// Predict one record with the model called `model_name` in `dir`.
    ///
    /// An Untrained directory or an unknown model is `ArtifactNotFound`.
    pub fn predict_pipeline(
        &self,
        record: &FeatureRecord,
        model_name: &str,
        dir: impl AsRef<Path>,
    ) -> Result<PredictionResult> {
        let store = self.store(dir);
        let model_path = store.model_path(model_name)?;

        let _guard = store.read_guard();
        let x = self.preprocessor().prepare_prediction_input(record, &store)?;
        let result = PredictionRunner::new().predict(&model_path, &x)?;
        debug!(model = %model_name, prediction = %result.prediction, "Predicted");
        Ok(result)
    }

    /// Whether `dir` holds a committed artifact set
    pub fn state(&self, dir: impl AsRef<Path>) -> Result<ArtifactState> {
        let store = self.store(dir);
        let _guard = store.read_guard();
        if !store.exists(ArtifactName::Manifest) {
            return Ok(ArtifactState::Untrained);
        }
        Ok(ArtifactState::Trained(store.load(ArtifactName::Manifest)?))
    }

    /// Committed artifacts in `dir`
    pub fn list_artifacts(&self, dir: impl AsRef<Path>) -> Result<Vec<ArtifactInfo>> {
        self.store(dir).list()
    }

    /// Raw bytes of one artifact file
    pub fn download_artifact(&self, dir: impl AsRef<Path>, file_name: &str) -> Result<Vec<u8>> {
        self.store(dir).read_bytes(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::preprocessing::record_from_json;
    use crate::training::TrainingConfig;
    use serde_json::json;

    const CSV: &str = "x,group,label\n\
        1.0,a,no\n2.0,a,no\n1.5,b,no\n0.5,a,no\n1.2,b,no\n\
        8.0,c,yes\n9.0,c,yes\n8.5,b,yes\n7.5,c,yes\n9.2,c,yes\n";

    fn pipeline() -> Pipeline {
        Pipeline::new(
            PipelineConfig::default()
                .with_training(TrainingConfig::default().with_n_estimators(5).with_test_size(0.3)),
        )
    }

    #[test]
    fn test_untrained_then_trained() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline();
        assert_eq!(pipeline.state(dir.path()).unwrap(), ArtifactState::Untrained);

        pipeline
            .train_pipeline(CSV.as_bytes().to_vec(), "label", dir.path())
            .unwrap();

        match pipeline.state(dir.path()).unwrap() {
            ArtifactState::Trained(manifest) => {
                assert_eq!(manifest.target, "label");
                assert_eq!(manifest.feature_names, vec!["x", "group"]);
                assert_eq!(manifest.models.len(), 3);
            }
            other => panic!("expected trained state, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_from_json(json!({"x": 1.0})).unwrap();
        let err = pipeline()
            .predict_pipeline(&record, "SVC", dir.path())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_missing_target_leaves_directory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let err = pipeline()
            .train_pipeline(CSV.as_bytes().to_vec(), "churn", dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_model_name_must_be_plain() {
        let dir = tempfile::tempdir().unwrap();
        let record = FeatureRecord::new();
        let err = pipeline()
            .predict_pipeline(&record, "../SVC", dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
