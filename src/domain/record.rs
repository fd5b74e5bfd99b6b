//! Clinical record types for heart-failure risk prediction.
//!
//! Raw values arrive loosely typed from the form or JSON API and are turned
//! into a [`ClinicalRecord`] only through [`ClinicalRecord::validate`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single user-supplied value before validation.
///
/// Deserializes untagged, so JSON `1` is `Int`, `1.0` is `Float` and
/// `true` is `Bool`. Nothing here is coerced; the validator decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl RawValue {
    /// Convert text from an HTML form widget.
    ///
    /// Sliders and radios submit their values as strings; integer literals
    /// stay integers so radios keep their `0`/`1` shape.
    #[must_use]
    pub fn from_form_text(text: &str) -> Self {
        let trimmed = text.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) => Self::Float(f),
            Err(_) => Self::Text(text.to_string()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Null => "null",
        }
    }
}

/// Field name → raw value, as collected by the serving shell.
pub type RawInput = BTreeMap<String, RawValue>;

/// Binary clinical indicator (anaemia, diabetes, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Indicator {
    No,
    Yes,
}

impl Indicator {
    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::No => 0,
            Self::Yes => 1,
        }
    }
}

/// Canonical field order used for validation and error reporting.
pub const FIELD_NAMES: [&str; 11] = [
    "age",
    "anaemia",
    "diabetes",
    "high_blood_pressure",
    "sex",
    "smoking",
    "creatinine_phosphokinase",
    "ejection_fraction",
    "platelets",
    "serum_creatinine",
    "serum_sodium",
];

/// One failed field check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Raw input rejected by the validator.
///
/// Holds every failing field in canonical order; the message names the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", summary(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn summary(errors: &[FieldError]) -> String {
    errors
        .first()
        .map_or_else(|| "invalid input".to_string(), ToString::to_string)
}

impl ValidationError {
    /// Name of the first invalid field.
    #[must_use]
    pub fn first_field(&self) -> Option<&'static str> {
        self.errors.first().map(|e| e.field)
    }
}

/// A validated patient observation.
///
/// Only [`ClinicalRecord::validate`] constructs one, so every instance has
/// passed type and domain checks. There are no setters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalRecord {
    age: f64,
    anaemia: Indicator,
    diabetes: Indicator,
    high_blood_pressure: Indicator,
    sex: Indicator,
    smoking: Indicator,
    creatinine_phosphokinase: f64,
    ejection_fraction: f64,
    platelets: f64,
    serum_creatinine: f64,
    serum_sodium: f64,
}

/// Domain constraint for a continuous field.
#[derive(Clone, Copy)]
enum Domain {
    Range(f64, f64),
    NonNegative,
}

struct Checker<'a> {
    raw: &'a RawInput,
    errors: Vec<FieldError>,
}

impl<'a> Checker<'a> {
    fn new(raw: &'a RawInput) -> Self {
        Self {
            raw,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &'static str, reason: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            reason: reason.into(),
        });
    }

    fn indicator(&mut self, field: &'static str) -> Indicator {
        match self.raw.get(field) {
            None => self.fail(field, "field required"),
            Some(RawValue::Int(0)) => return Indicator::No,
            Some(RawValue::Int(1)) => return Indicator::Yes,
            Some(RawValue::Int(v)) => self.fail(field, format!("must be exactly 0 or 1, got {v}")),
            Some(other) => self.fail(
                field,
                format!("must be exactly 0 or 1, got {}", other.kind()),
            ),
        }
        Indicator::No
    }

    fn number(&mut self, field: &'static str, domain: Domain) -> f64 {
        let value = match self.raw.get(field) {
            None => {
                self.fail(field, "field required");
                return f64::NAN;
            }
            Some(RawValue::Int(i)) => *i as f64,
            Some(RawValue::Float(f)) => *f,
            Some(other) => {
                self.fail(field, format!("must be a number, got {}", other.kind()));
                return f64::NAN;
            }
        };

        if !value.is_finite() {
            self.fail(field, "must be a finite number");
            return value;
        }

        match domain {
            Domain::Range(lo, hi) if !(lo..=hi).contains(&value) => {
                self.fail(field, format!("{value} out of range [{lo}, {hi}]"));
            }
            Domain::NonNegative if value < 0.0 => {
                self.fail(field, format!("{value} must be non-negative"));
            }
            _ => {}
        }
        value
    }
}

impl ClinicalRecord {
    /// Strictly validate raw input into a record.
    ///
    /// Indicators accept only the integers 0 and 1 (no `0.0`, no booleans);
    /// continuous fields accept integers or finite floats. All fields are
    /// checked so the error carries the complete list.
    ///
    /// # Errors
    /// Returns [`ValidationError`] if any field is missing, mistyped or out
    /// of its clinical domain.
    pub fn validate(raw: &RawInput) -> Result<Self, ValidationError> {
        let mut c = Checker::new(raw);

        let record = Self {
            age: c.number("age", Domain::Range(18.0, 120.0)),
            anaemia: c.indicator("anaemia"),
            diabetes: c.indicator("diabetes"),
            high_blood_pressure: c.indicator("high_blood_pressure"),
            sex: c.indicator("sex"),
            smoking: c.indicator("smoking"),
            creatinine_phosphokinase: c.number("creatinine_phosphokinase", Domain::NonNegative),
            ejection_fraction: c.number("ejection_fraction", Domain::Range(5.0, 85.0)),
            platelets: c.number("platelets", Domain::NonNegative),
            serum_creatinine: c.number("serum_creatinine", Domain::NonNegative),
            serum_sodium: c.number("serum_sodium", Domain::Range(110.0, 170.0)),
        };

        if c.errors.is_empty() {
            Ok(record)
        } else {
            Err(ValidationError { errors: c.errors })
        }
    }

    #[must_use]
    pub fn age(&self) -> f64 {
        self.age
    }

    #[must_use]
    pub fn anaemia(&self) -> Indicator {
        self.anaemia
    }

    #[must_use]
    pub fn diabetes(&self) -> Indicator {
        self.diabetes
    }

    #[must_use]
    pub fn high_blood_pressure(&self) -> Indicator {
        self.high_blood_pressure
    }

    #[must_use]
    pub fn sex(&self) -> Indicator {
        self.sex
    }

    #[must_use]
    pub fn smoking(&self) -> Indicator {
        self.smoking
    }

    #[must_use]
    pub fn creatinine_phosphokinase(&self) -> f64 {
        self.creatinine_phosphokinase
    }

    #[must_use]
    pub fn ejection_fraction(&self) -> f64 {
        self.ejection_fraction
    }

    #[must_use]
    pub fn platelets(&self) -> f64 {
        self.platelets
    }

    #[must_use]
    pub fn serum_creatinine(&self) -> f64 {
        self.serum_creatinine
    }

    #[must_use]
    pub fn serum_sodium(&self) -> f64 {
        self.serum_sodium
    }
}
