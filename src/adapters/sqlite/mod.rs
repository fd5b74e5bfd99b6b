//! SQLite adapter: Implementation of FeatureDeriver.
//!
//! Derived features are computed by SQL views over an in-memory SQLite
//! database. The macro library (`macros.sql`) is loaded first, then the
//! request-facing entry point (`online.sql`) which declares the typed
//! `online_input` table and the `gold_online_row` view.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a single `Mutex`, held only for the
//! insert/select/rollback of one derivation. Derivations are serialized
//! across all requests. A poisoned mutex is reported as
//! [`DerivationError::LockPoisoned`].
//!
//! # Determinism
//!
//! Each derivation runs inside a transaction that is always rolled back, so
//! `online_input` is empty between calls and no call can observe another.

use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};

use crate::domain::{ClinicalRecord, FeatureRow};
use crate::ports::{DerivationError, FeatureDeriver};

/// Reusable derivation views.
pub const MACROS_SQL: &str = include_str!("macros.sql");

/// Typed input table and the `gold_online_row` entry point.
pub const ONLINE_SQL: &str = include_str!("online.sql");

/// Positional parameter order of the entry point.
pub const ONLINE_PARAM_ORDER: [&str; 11] = [
    "age",
    "anaemia",
    "diabetes",
    "high_blood_pressure",
    "smoking",
    "sex",
    "creatinine_phosphokinase",
    "ejection_fraction",
    "platelets",
    "serum_creatinine",
    "serum_sodium",
];

const ONLINE_INSERT: &str = r"
    INSERT INTO online_input (
        age, anaemia, diabetes, high_blood_pressure, smoking, sex,
        creatinine_phosphokinase, ejection_fraction, platelets,
        serum_creatinine, serum_sodium
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
";

const ONLINE_SELECT: &str = "SELECT * FROM gold_online_row";

/// SQLite-backed feature deriver.
pub struct SqliteDeriver {
    conn: Mutex<Connection>,
}

impl SqliteDeriver {
    /// Open an in-memory database and load the bundled macro sources.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or a source fails.
    pub fn new() -> Result<Self, DerivationError> {
        Self::with_sources(MACROS_SQL, ONLINE_SQL)
    }

    /// Open an in-memory database and load the given macro sources.
    ///
    /// # Errors
    /// Returns [`DerivationError::Macros`] naming the source that failed.
    pub fn with_sources(macros_sql: &str, online_sql: &str) -> Result<Self, DerivationError> {
        let conn = Connection::open_in_memory()?;

        for (source_name, sql) in [("macros.sql", macros_sql), ("online.sql", online_sql)] {
            conn.execute_batch(sql)
                .map_err(|e| DerivationError::Macros {
                    source_name: source_name.to_string(),
                    reason: e.to_string(),
                })?;
        }

        let deriver = Self {
            conn: Mutex::new(conn),
        };

        // Resolve the entry point now so broken views fail at startup.
        let columns = deriver
            .output_columns()
            .map_err(|e| DerivationError::Macros {
                source_name: "online.sql".to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!(
            "Loaded derivation macros; gold_online_row exposes {} columns",
            columns.len()
        );

        Ok(deriver)
    }

    /// Column names `gold_online_row` produces, without running it.
    ///
    /// # Errors
    /// Returns error if the entry point cannot be prepared.
    pub fn output_columns(&self) -> Result<Vec<String>, DerivationError> {
        let conn = self.conn.lock().map_err(|_| DerivationError::LockPoisoned)?;
        let stmt = conn.prepare_cached(ONLINE_SELECT)?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    fn value_to_f64(column: &str, value: ValueRef<'_>) -> Result<Option<f64>, DerivationError> {
        match value {
            ValueRef::Null => Ok(None),
            ValueRef::Integer(i) => Ok(Some(i as f64)),
            // Overflowing ratios are undefined, like a division by zero.
            ValueRef::Real(f) => Ok(Some(f).filter(|v| v.is_finite())),
            ValueRef::Text(_) | ValueRef::Blob(_) => Err(DerivationError::NonNumeric {
                column: column.to_string(),
            }),
        }
    }
}

impl FeatureDeriver for SqliteDeriver {
    fn derive(&self, record: &ClinicalRecord) -> Result<FeatureRow, DerivationError> {
        let mut conn = self.conn.lock().map_err(|_| DerivationError::LockPoisoned)?;
        let tx = conn.transaction()?;

        tx.execute(
            ONLINE_INSERT,
            params![
                record.age(),
                record.anaemia().as_i64(),
                record.diabetes().as_i64(),
                record.high_blood_pressure().as_i64(),
                record.smoking().as_i64(),
                record.sex().as_i64(),
                record.creatinine_phosphokinase(),
                record.ejection_fraction(),
                record.platelets(),
                record.serum_creatinine(),
                record.serum_sodium(),
            ],
        )?;

        let rows = {
            let mut stmt = tx.prepare_cached(ONLINE_SELECT)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut query = stmt.query([])?;

            let mut rows = Vec::with_capacity(1);
            while let Some(row) = query.next()? {
                let mut out = FeatureRow::new();
                for (idx, name) in names.iter().enumerate() {
                    let value = Self::value_to_f64(name, row.get_ref(idx)?)?;
                    out.push(name.clone(), value);
                }
                rows.push(out);
            }
            rows
        };

        // Dropping `tx` on an early return above also rolls back.
        tx.rollback()?;

        let count = rows.len();
        let mut rows = rows.into_iter();
        match (rows.next(), count) {
            (Some(row), 1) => {
                tracing::debug!("Derived {} feature columns", row.len());
                Ok(row)
            }
            _ => Err(DerivationError::RowCount(count)),
        }
    }
}
