//! Feature derivation port: Trait for turning a record into a feature row.
//!
//! This trait abstracts the embedded SQL engine (SQLite) from the pipeline.

use crate::domain::{ClinicalRecord, FeatureRow};

/// Errors raised while computing derived features.
///
/// Never retried: they indicate a defect in the derivation macros or a data
/// shape the macros do not handle, and the same input fails the same way.
#[derive(Debug, thiserror::Error)]
pub enum DerivationError {
    #[error("Query engine error: {0}")]
    Engine(#[from] rusqlite::Error),

    #[error("Derivation returned {0} rows, expected exactly 1")]
    RowCount(usize),

    #[error("Derived column {column:?} is not numeric")]
    NonNumeric { column: String },

    #[error("Failed to load derivation macros from {source_name}: {reason}")]
    Macros { source_name: String, reason: String },

    #[error("Query engine connection lock poisoned")]
    LockPoisoned,
}

/// Trait for feature derivation.
///
/// Implementations must be pure and deterministic: the same record always
/// yields the same row, independent of earlier calls.
pub trait FeatureDeriver: Send + Sync {
    /// Derive raw plus engineered columns for one record.
    ///
    /// # Errors
    /// Returns [`DerivationError`] if the engine rejects the query or the
    /// result is not exactly one numeric row.
    fn derive(&self, record: &ClinicalRecord) -> Result<FeatureRow, DerivationError>;
}
