//! Predictor: positive-class probability and decision threshold.

use std::sync::Arc;

use crate::domain::{AlignedRow, RiskAssessment, RiskThreshold};
use crate::ports::{Classifier, ModelError};

/// Label of the "death event" class in the training data.
pub const POSITIVE_LABEL: i64 = 1;

/// Scores aligned rows with a trained classifier.
///
/// The positive class index is resolved from the model's class order once,
/// at construction; it is never assumed to be 0 or 1.
pub struct Predictor<C: Classifier> {
    model: Arc<C>,
    positive_index: usize,
    threshold: RiskThreshold,
}

impl<C: Classifier> Predictor<C> {
    /// # Errors
    /// Returns [`ModelError::UnknownClass`] if `positive_label` is not one of
    /// the model's classes.
    pub fn new(
        model: Arc<C>,
        positive_label: i64,
        threshold: RiskThreshold,
    ) -> Result<Self, ModelError> {
        let positive_index = model
            .classes()
            .iter()
            .position(|&c| c == positive_label)
            .ok_or_else(|| ModelError::UnknownClass(positive_label, model.classes().to_vec()))?;

        Ok(Self {
            model,
            positive_index,
            threshold,
        })
    }

    #[must_use]
    pub fn threshold(&self) -> RiskThreshold {
        self.threshold
    }

    /// Score one aligned row.
    ///
    /// # Errors
    /// Returns [`ModelError`] if the model rejects the row or returns a
    /// malformed probability vector.
    pub fn score(&self, row: &AlignedRow) -> Result<RiskAssessment, ModelError> {
        let proba = self.model.predict_proba(row)?;

        let expected = self.model.classes().len();
        if proba.len() != expected {
            return Err(ModelError::ProbabilityShape {
                expected,
                actual: proba.len(),
            });
        }

        let p = proba[self.positive_index];
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(ModelError::InvalidProbability(p));
        }

        Ok(RiskAssessment::new(p, self.threshold))
    }
}
