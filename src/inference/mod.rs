//! Inference module
//!
//! Loads one persisted classifier and predicts a single prepared row,
//! returning the label plus class probabilities when the model has them.

mod engine;

pub use engine::{PredictionResult, PredictionRunner};
