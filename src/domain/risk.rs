//! Risk assessment types.
//!
//! Represents the thresholded output of the heart-failure classifier.

use std::fmt;

use serde::Serialize;

/// Decision threshold tuned offline for the online-derivation model.
pub const BEST_THRESHOLD: f64 = 0.4891;

/// Risk label shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    /// Positive-class probability below the threshold
    Low,
    /// Positive-class probability at or above the threshold
    AtRisk,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low risk"),
            Self::AtRisk => write!(f, "At risk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Risk threshold {0} must lie in [0, 1]")]
pub struct ThresholdError(pub f64);

/// Minimum positive-class probability classified as at risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskThreshold(f64);

impl RiskThreshold {
    /// # Errors
    /// Returns [`ThresholdError`] if `value` is not a finite probability.
    pub fn new(value: f64) -> Result<Self, ThresholdError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ThresholdError(value))
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Inclusive: a probability equal to the threshold is at risk.
    #[must_use]
    pub fn classify(self, probability: f64) -> RiskLevel {
        if probability >= self.0 {
            RiskLevel::AtRisk
        } else {
            RiskLevel::Low
        }
    }
}

impl Default for RiskThreshold {
    fn default() -> Self {
        Self(BEST_THRESHOLD)
    }
}

/// Scored prediction for one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Positive-class ("death event") probability
    pub probability: f64,

    /// Threshold the probability was compared against
    pub threshold: f64,

    pub level: RiskLevel,
}

impl RiskAssessment {
    #[must_use]
    pub fn new(probability: f64, threshold: RiskThreshold) -> Self {
        Self {
            probability,
            threshold: threshold.value(),
            level: threshold.classify(probability),
        }
    }

    #[must_use]
    pub fn is_at_risk(&self) -> bool {
        self.level == RiskLevel::AtRisk
    }
}

impl fmt::Display for RiskAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}% — {}", self.probability * 100.0, self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let thr = RiskThreshold::default();
        assert_eq!(thr.classify(BEST_THRESHOLD), RiskLevel::AtRisk);
        assert_eq!(thr.classify(0.4890), RiskLevel::Low);
        assert_eq!(thr.classify(0.95), RiskLevel::AtRisk);
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(RiskThreshold::new(0.1027).is_ok());
        assert_eq!(RiskThreshold::new(1.5), Err(ThresholdError(1.5)));
        assert_eq!(
            ThresholdError(1.5).to_string(),
            "Risk threshold 1.5 must lie in [0, 1]"
        );
        assert!(RiskThreshold::new(f64::NAN).is_err());
    }

    #[test]
    fn test_formatting() {
        let low = RiskAssessment::new(0.45, RiskThreshold::default());
        assert_eq!(low.to_string(), "45.0% — Low risk");
        assert!(!low.is_at_risk());

        let high = RiskAssessment::new(0.8123, RiskThreshold::default());
        assert_eq!(high.to_string(), "81.2% — At risk");
    }
}
