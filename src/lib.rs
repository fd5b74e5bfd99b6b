//! # hfrisk
//!
//! Heart-failure risk prediction from eleven clinical inputs.
//!
//! This crate provides:
//! - Strict validation of raw clinical fields
//! - Feature derivation through SQL views in an embedded SQLite database
//! - Alignment to the trained model's feature schema
//! - Gradient-boosted tree scoring with a fixed decision threshold
//! - A small web form serving the predictions
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (ClinicalRecord, FeatureSchema, RiskAssessment)
//! - `ports`: Trait definitions for the query engine and the model
//! - `adapters`: Concrete implementations (SQLite, JSON tree ensemble)
//! - `application`: The prediction pipeline
//! - `web`: HTTP serving shell

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod web;

pub use application::{PredictionService, Predictor, Stage};
pub use domain::{ClinicalRecord, RawInput, RawValue, RiskAssessment, RiskLevel};

/// Result type for hfrisk operations
pub type Result<T> = std::result::Result<T, HfriskError>;

/// Main error type for hfrisk
#[derive(Debug, thiserror::Error)]
pub enum HfriskError {
    #[error("{0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Feature derivation failed: {0}")]
    Derivation(#[from] ports::DerivationError),

    #[error("{0}")]
    MissingFeatures(#[from] domain::MissingFeatureError),

    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ports::ModelError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl HfriskError {
    /// True when the caller can fix the request and resubmit.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Pipeline stage the request had reached when this error stopped it.
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            Self::Validation(_) => Some(Stage::ReceivedRaw),
            Self::Derivation(_) => Some(Stage::Validated),
            Self::MissingFeatures(_) => Some(Stage::Derived),
            Self::ModelInvocation(_) => Some(Stage::Aligned),
            Self::Artifact(_) | Self::Config(_) => None,
        }
    }
}
