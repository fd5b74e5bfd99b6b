//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `sqlite`: SQLite views for feature derivation
//! - `gbdt`: JSON tree ensemble for scoring
//! - `artifacts`: model/schema loading with digest verification
//! - `sanitize`: redaction of clinical values in logs

pub mod artifacts;
pub mod gbdt;
pub mod sanitize;
pub mod sqlite;

pub use artifacts::{ArtifactError, Artifacts};
