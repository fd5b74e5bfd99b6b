//! Domain layer: Core types and logic.
//!
//! Pure Rust types with no I/O: the validated clinical record, the feature
//! schema contract and the thresholded risk assessment.

mod features;
mod record;
mod risk;

pub use features::{AlignedRow, FeatureRow, FeatureSchema, MissingFeatureError, SchemaError};
pub use record::{ClinicalRecord, FieldError, Indicator, RawInput, RawValue, ValidationError, FIELD_NAMES};
pub use risk::{RiskAssessment, RiskLevel, RiskThreshold, ThresholdError, BEST_THRESHOLD};

#[cfg(test)]
pub(crate) use record::tests::reference_input;
