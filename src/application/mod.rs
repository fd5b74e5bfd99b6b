//! Application layer: the prediction pipeline.
//!
//! Wires the deriver and classifier ports into a single request path.

mod inference;
mod predictor;

use std::fmt;

pub use inference::PredictionService;
pub use predictor::{Predictor, POSITIVE_LABEL};

/// Pipeline stages a request passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    ReceivedRaw,
    Validated,
    Derived,
    Aligned,
    Scored,
    Formatted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReceivedRaw => "received-raw",
            Self::Validated => "validated",
            Self::Derived => "derived",
            Self::Aligned => "aligned",
            Self::Scored => "scored",
            Self::Formatted => "formatted",
        };
        f.write_str(name)
    }
}
