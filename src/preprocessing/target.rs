//! Target column handling

use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A class label as observed in the target column.
///
/// Serialized untagged, so labels round-trip as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Label {
    /// Numeric view used by error metrics; text labels have none
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Label::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Label::Int(i) => Some(*i as f64),
            Label::Text(_) => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Bool(b) => write!(f, "{}", b),
            Label::Int(i) => write!(f, "{}", i),
            Label::Text(s) => f.write_str(s),
        }
    }
}

/// The untouched target column, restricted to rows with a label
#[derive(Debug, Clone, PartialEq)]
pub struct TargetVector {
    name: String,
    values: Vec<Label>,
}

impl TargetVector {
    pub fn new(name: impl Into<String>, values: Vec<Label>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Read labels from a polars column.
    ///
    /// Returns the vector together with the row indices that carried a
    /// label; null targets are skipped.
    pub fn from_column(name: &str, column: &Column) -> Result<(Self, Vec<usize>)> {
        let labels = column_labels(name, column)?;
        let kept: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, label)| label.as_ref().map(|_| i))
            .collect();
        let values = labels.into_iter().flatten().collect();
        Ok((Self::new(name, values), kept))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[Label] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sorted distinct labels
    pub fn classes(&self) -> Vec<Label> {
        let mut classes = self.values.clone();
        classes.sort();
        classes.dedup();
        classes
    }

    /// Labels at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Vec<Label> {
        indices.iter().map(|&i| self.values[i].clone()).collect()
    }
}

fn column_labels(name: &str, column: &Column) -> Result<Vec<Option<Label>>> {
    let series = column.as_materialized_series();
    let labels: Vec<Option<Label>> = match series.dtype() {
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map(Label::Bool))
            .collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let cast = series.cast(&DataType::Int64)?;
            let ints = cast.i64()?;
            ints.into_iter().map(|v| v.map(Label::Int)).collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = series.cast(&DataType::Float64)?;
            let floats = cast.f64()?;
            floats
                .into_iter()
                .map(|v| match v {
                    None => Ok(None),
                    Some(x) if x.is_nan() => Ok(None),
                    Some(x) if x.is_finite() && x.fract() == 0.0 => Ok(Some(Label::Int(x as i64))),
                    Some(x) => Err(PipelineError::InvalidTarget {
                        target: name.to_string(),
                        reason: format!("continuous value {} cannot be used as a class label", x),
                    }),
                })
                .collect::<Result<Vec<_>>>()?
        }
        _ => {
            let cast = series.cast(&DataType::String)?;
            let strings = cast.str()?;
            strings
                .into_iter()
                .map(|v| v.map(|s| Label::Text(s.to_string())))
                .collect()
        }
    };
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_ordering_and_json() {
        let mut labels = vec![Label::Text("b".into()), Label::Int(3), Label::Int(-1)];
        labels.sort();
        assert_eq!(labels, vec![Label::Int(-1), Label::Int(3), Label::Text("b".into())]);

        assert_eq!(serde_json::to_string(&Label::Int(1)).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Label::Text("yes".into())).unwrap(), "\"yes\"");
        let parsed: Label = serde_json::from_str("true").unwrap();
        assert_eq!(parsed, Label::Bool(true));
    }

    #[test]
    fn test_integer_target() {
        let df = df!("churn" => &[0i64, 1, 1, 0]).unwrap();
        let (target, kept) = TargetVector::from_column("churn", df.column("churn").unwrap()).unwrap();
        assert_eq!(kept, vec![0, 1, 2, 3]);
        assert_eq!(target.classes(), vec![Label::Int(0), Label::Int(1)]);
    }

    #[test]
    fn test_integral_float_target_and_nulls() {
        let df = df!("y" => &[Some(1.0), None, Some(0.0), Some(f64::NAN)]).unwrap();
        let (target, kept) = TargetVector::from_column("y", df.column("y").unwrap()).unwrap();
        assert_eq!(kept, vec![0, 2]);
        assert_eq!(target.values(), &[Label::Int(1), Label::Int(0)]);
    }

    #[test]
    fn test_continuous_target_rejected() {
        let df = df!("y" => &[0.5, 1.25]).unwrap();
        let err = TargetVector::from_column("y", df.column("y").unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTarget { .. }));
    }

    #[test]
    fn test_text_target() {
        let df = df!("label" => &["yes", "no", "yes"]).unwrap();
        let (target, _) = TargetVector::from_column("label", df.column("label").unwrap()).unwrap();
        assert_eq!(
            target.classes(),
            vec![Label::Text("no".into()), Label::Text("yes".into())]
        );
        assert_eq!(target.select(&[2, 1]), vec![Label::Text("yes".into()), Label::Text("no".into())]);
        assert_eq!(target.values()[0].as_f64(), None);
    }
}
