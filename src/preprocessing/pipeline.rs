//! Preprocessing pipeline: encode, impute, scale

use ndarray::Array2;
use polars::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    CategoryEncoder, FeatureRecord, Imputer, InputMode, PreprocessingConfig, StandardScaler,
    TargetVector, UnknownCategoryPolicy,
};
use crate::artifacts::{ArtifactName, ArtifactStore, ArtifactWriter};
use crate::error::{PipelineError, Result};

/// Everything needed to reproduce the training-time transform
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingState {
    pub feature_names: Vec<String>,
    pub encoder: CategoryEncoder,
    pub imputer: Imputer,
    pub scaler: StandardScaler,
}

impl PreprocessingState {
    /// Write the four preprocessing artifacts
    pub fn persist(&self, writer: &mut impl ArtifactWriter) -> Result<()> {
        writer.save(ArtifactName::Scaler, &self.scaler)?;
        writer.save(ArtifactName::Imputer, &self.imputer)?;
        writer.save(ArtifactName::FeatureNames, &self.feature_names)?;
        writer.save(ArtifactName::Encoder, &self.encoder)?;
        Ok(())
    }

    /// Load the preprocessing artifacts and check they agree with each other
    pub fn load(store: &ArtifactStore) -> Result<Self> {
        let feature_names: Vec<String> = store.load(ArtifactName::FeatureNames)?;
        let imputer: Imputer = store.load(ArtifactName::Imputer)?;
        let scaler: StandardScaler = store.load(ArtifactName::Scaler)?;
        let encoder: CategoryEncoder = store.load(ArtifactName::Encoder)?;

        let width = feature_names.len();
        if imputer.fill_values().len() != width || scaler.mean().len() != width {
            return Err(PipelineError::InconsistentArtifacts(format!(
                "{} features, imputer has {}, scaler has {}",
                width,
                imputer.fill_values().len(),
                scaler.mean().len()
            )));
        }
        if let Some(column) = encoder.columns().find(|c| !feature_names.iter().any(|f| f == c)) {
            return Err(PipelineError::InconsistentArtifacts(format!(
                "encoder column '{}' is not a feature",
                column
            )));
        }

        Ok(Self {
            feature_names,
            encoder,
            imputer,
            scaler,
        })
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Turn one record into a standardized 1 x n_features row
    pub fn transform_record(
        &self,
        record: &FeatureRecord,
        config: &PreprocessingConfig,
    ) -> Result<Array2<f64>> {
        let mut row = Array2::from_elem((1, self.n_features()), f64::NAN);
        let mut absent = Vec::new();

        for (j, name) in self.feature_names.iter().enumerate() {
            match record.get(name) {
                None => absent.push(name.clone()),
                Some(Value::Null) => {}
                Some(value) => row[[0, j]] = self.encode_value(name, value, config)?,
            }
        }

        if !absent.is_empty() {
            if config.input_mode == InputMode::Strict {
                return Err(PipelineError::MissingFeatures { missing: absent });
            }
            debug!(missing = ?absent, "Imputing features absent from record");
        }

        let imputed = self.imputer.transform(&row)?;
        self.scaler.transform(&imputed)
    }

    fn encode_value(&self, name: &str, value: &Value, config: &PreprocessingConfig) -> Result<f64> {
        if self.encoder.is_categorical(name) {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => return Err(invalid_value(name, other)),
            };
            return match self.encoder.encode(name, &text) {
                Some(code) => Ok(code as f64),
                None => match config.unknown_category {
                    UnknownCategoryPolicy::Reject => Err(PipelineError::UnknownCategory {
                        feature: name.to_string(),
                        value: text,
                    }),
                    UnknownCategoryPolicy::TreatAsMissing => {
                        debug!(feature = %name, value = %text, "Unknown category treated as missing");
                        Ok(f64::NAN)
                    }
                },
            };
        }

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        // "inf" and "NaN" parse as f64 but are not usable feature values
        parsed
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid_value(name, value))
    }
}

fn invalid_value(name: &str, value: &Value) -> PipelineError {
    PipelineError::InvalidFeatureValue {
        feature: name.to_string(),
        value: value.to_string(),
    }
}

/// Raw feature column pulled out of the table
enum RawColumn {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

fn extract_column(name: &str, column: &Column) -> Result<RawColumn> {
    let series = column.as_materialized_series();
    match series.dtype() {
        DataType::Boolean
        | DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float32
        | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast
                .f64()?
                .into_iter()
                .map(|v| match v {
                    Some(x) if !x.is_finite() => Err(PipelineError::InvalidFeatureValue {
                        feature: name.to_string(),
                        value: x.to_string(),
                    }),
                    other => Ok(other),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(RawColumn::Numeric(values))
        }
        _ => {
            let cast = series.cast(&DataType::String)?;
            let values = cast
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect();
            Ok(RawColumn::Categorical(values))
        }
    }
}

/// Fits the feature transform on a training table and replays it on records
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessingConfig,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Fit the transform, persist its artifacts through `writer`, and return
    /// the standardized feature matrix with the untouched target.
    pub fn fit(
        &self,
        table: &DataFrame,
        target: &str,
        writer: &mut impl ArtifactWriter,
    ) -> Result<(Array2<f64>, TargetVector)> {
        let (features, labels, state) = self.fit_transform(table, target)?;
        state.persist(writer)?;
        Ok((features, labels))
    }

    /// Fit without persisting anything
    pub fn fit_transform(
        &self,
        table: &DataFrame,
        target: &str,
    ) -> Result<(Array2<f64>, TargetVector, PreprocessingState)> {
        let column_names: Vec<String> = table
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let target_column = table
            .column(target)
            .map_err(|_| PipelineError::TargetNotFound {
                target: target.to_string(),
                available: column_names.clone(),
            })?;
        if table.height() == 0 {
            return Err(PipelineError::InsufficientData("table has no rows".to_string()));
        }

        let (labels, kept) = TargetVector::from_column(target, target_column)?;
        if kept.len() < table.height() {
            warn!(
                target = %target,
                dropped = table.height() - kept.len(),
                "Dropping rows with a missing target"
            );
        }
        if kept.is_empty() {
            return Err(PipelineError::InsufficientData(format!(
                "target column '{}' has no values",
                target
            )));
        }

        let feature_names: Vec<String> = column_names
            .into_iter()
            .filter(|name| name != target)
            .collect();
        if feature_names.is_empty() {
            return Err(PipelineError::InsufficientData(
                "table has no feature columns".to_string(),
            ));
        }

        let mut raw = Array2::from_elem((kept.len(), feature_names.len()), f64::NAN);
        let mut encoder = CategoryEncoder::new();
        for (j, name) in feature_names.iter().enumerate() {
            match extract_column(name, table.column(name)?)? {
                RawColumn::Numeric(values) => {
                    for (i, &row) in kept.iter().enumerate() {
                        if let Some(v) = values[row] {
                            raw[[i, j]] = v;
                        }
                    }
                }
                RawColumn::Categorical(values) => {
                    encoder.fit_column(name, kept.iter().filter_map(|&row| values[row].as_deref()));
                    for (i, &row) in kept.iter().enumerate() {
                        if let Some(code) = values[row].as_deref().and_then(|v| encoder.encode(name, v)) {
                            raw[[i, j]] = code as f64;
                        }
                    }
                }
            }
        }

        let mut imputer = Imputer::new();
        let imputed = imputer.fit_transform(&raw, &feature_names)?;
        let mut scaler = StandardScaler::new();
        let features = scaler.fit_transform(&imputed, &feature_names)?;

        info!(
            rows = features.nrows(),
            features = feature_names.len(),
            categorical = encoder.columns().count(),
            "Fitted preprocessing"
        );

        let state = PreprocessingState {
            feature_names,
            encoder,
            imputer,
            scaler,
        };
        Ok((features, labels, state))
    }

    /// Rebuild a model-ready row for `record` from the artifacts in `store`.
    /// Nothing is refitted.
    pub fn prepare_prediction_input(
        &self,
        record: &FeatureRecord,
        store: &ArtifactStore,
    ) -> Result<Array2<f64>> {
        let state = PreprocessingState::load(store)?;
        state.transform_record(record, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::preprocessing::{record_from_json, Label};
    use serde_json::json;

    fn sample_df() -> DataFrame {
        df!(
            "age" => &[Some(20.0), Some(30.0), None, Some(50.0)],
            "city" => &[Some("B"), Some("A"), Some("B"), None],
            "churn" => &[0i64, 1, 0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_fit_transform_shapes_and_state() {
        let (x, y, state) = Preprocessor::new()
            .fit_transform(&sample_df(), "churn")
            .unwrap();

        assert_eq!(x.dim(), (4, 2));
        assert_eq!(y.len(), 4);
        assert_eq!(state.feature_names, vec!["age", "city"]);
        // age mean over observed values
        assert!((state.imputer.fill_values()[0] - 100.0 / 3.0).abs() < 1e-12);
        // city codes: B=1, A=0, B=1 -> mean 2/3
        assert!((state.imputer.fill_values()[1] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(state.encoder.categories("city").unwrap(), &["A", "B"]);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_target_not_encoded() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0],
            "label" => &["yes", "no", "yes"],
        )
        .unwrap();
        let (_, y, state) = Preprocessor::new().fit_transform(&df, "label").unwrap();
        assert_eq!(y.values()[0], Label::Text("yes".into()));
        assert!(!state.encoder.is_categorical("label"));
    }

    #[test]
    fn test_missing_target_column() {
        let err = Preprocessor::new()
            .fit_transform(&sample_df(), "nope")
            .unwrap_err();
        assert!(matches!(err, PipelineError::TargetNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_record_matches_training_transform() {
        let df = sample_df();
        let (x, _, state) = Preprocessor::new().fit_transform(&df, "churn").unwrap();

        let record = record_from_json(json!({"age": 30.0, "city": "A"})).unwrap();
        let row = state
            .transform_record(&record, &PreprocessingConfig::default())
            .unwrap();
        assert!((row[[0, 0]] - x[[1, 0]]).abs() < 1e-12);
        assert!((row[[0, 1]] - x[[1, 1]]).abs() < 1e-12);
    }

    #[test]
    fn test_absent_features_are_imputed_in_lenient_mode() {
        let (x, _, state) = Preprocessor::new()
            .fit_transform(&sample_df(), "churn")
            .unwrap();
        let record = record_from_json(json!({"city": "B"})).unwrap();
        let row = state
            .transform_record(&record, &PreprocessingConfig::default())
            .unwrap();
        // row 2 had a missing age and city B
        assert!((row[[0, 0]] - x[[2, 0]]).abs() < 1e-12);
    }

    #[test]
    fn test_strict_mode_rejects_absent_features() {
        let (_, _, state) = Preprocessor::new()
            .fit_transform(&sample_df(), "churn")
            .unwrap();
        let record = record_from_json(json!({"city": "B"})).unwrap();
        let config = PreprocessingConfig::new().with_input_mode(InputMode::Strict);
        let err = state.transform_record(&record, &config).unwrap_err();
        assert!(matches!(err, PipelineError::MissingFeatures { ref missing } if missing == &["age"]));
    }

    #[test]
    fn test_unknown_category_policies() {
        let (_, _, state) = Preprocessor::new()
            .fit_transform(&sample_df(), "churn")
            .unwrap();
        let record = record_from_json(json!({"age": 40, "city": "Z"})).unwrap();

        let err = state
            .transform_record(&record, &PreprocessingConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory { .. }));

        let lenient = PreprocessingConfig::new()
            .with_unknown_category(UnknownCategoryPolicy::TreatAsMissing);
        let row = state.transform_record(&record, &lenient).unwrap();
        assert!(row.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_numeric_strings_and_bad_values() {
        let (_, _, state) = Preprocessor::new()
            .fit_transform(&sample_df(), "churn")
            .unwrap();
        let config = PreprocessingConfig::default();

        let ok = record_from_json(json!({"age": " 42 ", "city": "A"})).unwrap();
        assert!(state.transform_record(&ok, &config).is_ok());

        let bad = record_from_json(json!({"age": "old", "city": "A"})).unwrap();
        assert!(matches!(
            state.transform_record(&bad, &config),
            Err(PipelineError::InvalidFeatureValue { .. })
        ));
    }

    #[test]
    fn test_non_finite_record_values_rejected() {
        let (_, _, state) = Preprocessor::new()
            .fit_transform(&sample_df(), "churn")
            .unwrap();
        let config = PreprocessingConfig::default();

        for value in ["inf", "-inf", "NaN", "infinity"] {
            let record = record_from_json(json!({"age": value, "city": "A"})).unwrap();
            match state.transform_record(&record, &config) {
                Err(PipelineError::InvalidFeatureValue { feature, .. }) => assert_eq!(feature, "age"),
                other => panic!("{} should be rejected, got {:?}", value, other),
            }
        }
    }

    #[test]
    fn test_non_finite_training_cells_rejected() {
        let df = df!(
            "x" => &[1.0, f64::INFINITY, 3.0, 4.0],
            "y" => &[0i64, 1, 0, 1],
        )
        .unwrap();
        let err = Preprocessor::new().fit_transform(&df, "y").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFeatureValue { ref feature, .. } if feature == "x"));
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }
}
