//! Model training module
//!
//! Trains a fixed set of classifiers on a preprocessed feature matrix:
//! - Logistic regression (linear)
//! - RBF support vector classifier with Platt probabilities (kernel)
//! - Random forest of Gini decision trees (ensemble)
//!
//! [`ModelTrainer`] holds out a seeded test split, evaluates each model on
//! it and hands every fitted model to an [`ArtifactWriter`](crate::artifacts::ArtifactWriter).

mod config;
mod engine;
mod models;
pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use config::{ForestConfig, LogisticConfig, SvcConfig, TrainingConfig};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{
    train_test_split, ClassifierArtifact, ModelFailureRecord, ModelResults, ModelTrainer,
    TrainedModel, TrainingReport,
};
pub use linear_models::LogisticRegression;
pub use models::{
    accuracy_score, mean_squared_error, weighted_precision_recall_f1, EvaluationMetrics, ModelKind,
};
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::SupportVectorClassifier;
