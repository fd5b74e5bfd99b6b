//! Classifier port: Trait for the trained risk model.
//!
//! This trait abstracts the model format (JSON tree ensemble) from the
//! predictor.

use crate::domain::AlignedRow;

/// Errors from loading or invoking the trained model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model expects {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Model feature {index} is {expected:?}, row has {actual:?}")]
    FeatureName {
        index: usize,
        expected: String,
        actual: String,
    },

    #[error("Model returned {actual} probabilities for {expected} classes")]
    ProbabilityShape { expected: usize, actual: usize },

    #[error("Model returned probability {0}, expected a value in [0, 1]")]
    InvalidProbability(f64),

    #[error("Positive class {0} not among model classes {1:?}")]
    UnknownClass(i64, Vec<i64>),

    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

/// Trait for a pre-fit probabilistic classifier.
pub trait Classifier: Send + Sync {
    /// Class labels in the order `predict_proba` reports them.
    fn classes(&self) -> &[i64];

    /// Feature columns the model was fit on, in order.
    fn feature_names(&self) -> &[String];

    /// Probability per class for one aligned row.
    ///
    /// # Errors
    /// Returns [`ModelError`] if the row does not match the model's inputs.
    fn predict_proba(&self, row: &AlignedRow) -> Result<Vec<f64>, ModelError>;
}
