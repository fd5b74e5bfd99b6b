//! Feature rows and the schema contract between derivation and the model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One derived row: column names with their values, in derivation order.
///
/// `None` is a SQL NULL (e.g. a ratio with a zero denominator).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FeatureRow {
    columns: Vec<(String, Option<f64>)>,
}

impl FeatureRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Option<f64>) {
        self.columns.push((name.into(), value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Option<f64>> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| *value)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|(col, _)| col == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(col, _)| col.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.columns.iter().map(|(col, value)| (col.as_str(), *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<f64>)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (S, Option<f64>)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(c, v)| (c.into(), v)).collect(),
        }
    }
}

/// Schema columns absent from a derived row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing required features: {}", .missing.join(", "))]
pub struct MissingFeatureError {
    /// Every missing column, in schema order.
    pub missing: Vec<String>,
}

/// Problems with the schema file itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Feature schema is empty")]
    Empty,

    #[error("Feature schema lists {0:?} more than once")]
    Duplicate(String),
}

/// A row whose columns are exactly the schema's, in the schema's order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    columns: Vec<String>,
    values: Vec<f64>,
}

impl AlignedRow {
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order; a NULL from derivation is `NaN`.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered feature columns the trained model expects.
///
/// Loaded once next to the model artifact; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.columns
    }
}

impl FeatureSchema {
    /// Build a schema, rejecting empty or duplicated column lists.
    ///
    /// # Errors
    /// Returns [`SchemaError`] if the list is empty or repeats a name.
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for col in &columns {
            if !seen.insert(col.as_str()) {
                return Err(SchemaError::Duplicate(col.clone()));
            }
        }
        Ok(Self { columns })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Select and reorder `row` to match this schema.
    ///
    /// The model is sensitive to column order, so this is the one place the
    /// order is enforced. Extra derived columns are dropped; NULL and
    /// non-finite values become NaN.
    ///
    /// # Errors
    /// Returns [`MissingFeatureError`] listing every schema column the row
    /// does not have.
    pub fn align(&self, row: &FeatureRow) -> Result<AlignedRow, MissingFeatureError> {
        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|col| !row.contains(col))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(MissingFeatureError { missing });
        }

        let values = self
            .columns
            .iter()
            .map(|col| {
                row.get(col)
                    .flatten()
                    .filter(|v| v.is_finite())
                    .unwrap_or(f64::NAN)
            })
            .collect();

        Ok(AlignedRow {
            columns: self.columns.clone(),
            values,
        })
    }
}
