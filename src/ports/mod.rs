//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the pipeline and external systems (query engine, trained model).

mod classifier;
mod deriver;

pub use classifier::{Classifier, ModelError};
pub use deriver::{DerivationError, FeatureDeriver};
