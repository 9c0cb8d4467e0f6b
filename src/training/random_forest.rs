//! Random forest classifier
//!
//! Bagged Gini trees with a random feature subset at every split.
//! Each tree draws from its own ChaCha8 stream seeded from the forest seed
//! and the tree index, so results do not depend on thread scheduling.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::ForestConfig;
use super::decision_tree::DecisionTree;
use super::linear_models::argmax_rows;
use super::models::{check_samples, n_classes};
use crate::error::{PipelineError, Result};

/// Number of features to consider at each split
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`, at least one
    #[default]
    Sqrt,
    /// `floor(log2(n_features))`, at least one
    Log2,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        let m = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Fixed(m) => *m,
        };
        m.clamp(1, n_features.max(1))
    }
}

/// Random forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    pub fn from_config(config: &ForestConfig, random_state: u64) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features,
            bootstrap: config.bootstrap,
            random_state,
            n_features: 0,
            n_classes: 0,
        }
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit on class indices `0..k`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_samples(x.nrows(), y.len())?;
        if self.n_estimators == 0 {
            return Err(PipelineError::invalid_parameter(
                "n_estimators",
                0,
                "must be positive",
            ));
        }
        let k = n_classes(y)?;
        let n_samples = x.nrows();
        let max_features = self.max_features.resolve(x.ncols());

        let trees: Vec<DecisionTree> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.wrapping_add(tree_idx as u64));

                let indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_sample = x.select(Axis(0), &indices);
                let y_sample = y.select(Axis(0), &indices);

                let mut tree = DecisionTree::new()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_n_classes(k)
                    .with_random_state(rng.next_u64());
                tree.fit(&x_sample, &y_sample)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            trees = trees.len(),
            max_features,
            classes = k,
            "Random forest fitted"
        );
        self.trees = trees;
        self.n_features = x.ncols();
        self.n_classes = k;
        Ok(self)
    }

    /// Mean of the per-tree leaf class distributions
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        let per_tree: Vec<Array2<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        // summed in tree order so the floating point result is reproducible
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for p in &per_tree {
            proba += p;
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
