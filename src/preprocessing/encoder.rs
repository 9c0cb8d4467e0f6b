//! Categorical label encoding

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Closed per-column vocabularies fitted on training data.
///
/// Each category maps to its rank in the sorted vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    vocabularies: BTreeMap<String, Vec<String>>,
}

impl CategoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the vocabulary of one column from its observed values
    pub fn fit_column<'a>(&mut self, column: &str, values: impl IntoIterator<Item = &'a str>) {
        let mut categories: Vec<String> = values.into_iter().map(str::to_string).collect();
        categories.sort();
        categories.dedup();
        self.vocabularies.insert(column.to_string(), categories);
    }

    /// Whether `column` was fitted as categorical
    pub fn is_categorical(&self, column: &str) -> bool {
        self.vocabularies.contains_key(column)
    }

    /// Code of `value` in `column`, `None` when the category was never seen
    pub fn encode(&self, column: &str, value: &str) -> Option<usize> {
        self.vocabularies
            .get(column)
            .and_then(|categories| categories.binary_search_by(|c| c.as_str().cmp(value)).ok())
    }

    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.vocabularies.get(column).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.vocabularies.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_codes() {
        let mut encoder = CategoryEncoder::new();
        encoder.fit_column("city", ["C", "A", "B", "A"]);

        assert_eq!(encoder.encode("city", "A"), Some(0));
        assert_eq!(encoder.encode("city", "B"), Some(1));
        assert_eq!(encoder.encode("city", "C"), Some(2));
        assert_eq!(encoder.categories("city").unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_category() {
        let mut encoder = CategoryEncoder::new();
        encoder.fit_column("city", ["A"]);
        assert_eq!(encoder.encode("city", "Z"), None);
        assert_eq!(encoder.encode("country", "A"), None);
        assert!(encoder.is_categorical("city"));
        assert!(!encoder.is_categorical("age"));
    }
}
