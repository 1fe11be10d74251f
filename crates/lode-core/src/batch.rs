//! Rows and row batches.
//!
//! A [`Row`] maps column names to [`Value`]s; a [`Batch`] is an ordered
//! collection of rows moving through the pipeline as one unit. Batches carry
//! no schema of their own: table schemas live alongside table definitions
//! and are applied when a batch is written.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::value::Value;

/// Deterministic text encoding of a row's merge key.
///
/// Built by joining `column=key_repr` pairs in the key-column order given by
/// the caller, so composite keys are position-sensitive and unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowKey(String);

impl RowKey {
    /// Returns the encoded key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single table row: column name to value.
///
/// Uses `BTreeMap` internally so iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    /// Creates a new empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value, replacing any existing value.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    /// Sets a column value and returns the row, for fluent construction.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set(column, value);
        self
    }

    /// Gets a column value. Absent columns read as no value; callers that
    /// want SQL semantics treat that the same as [`Value::Null`].
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// Returns the string content of a column, if present and a string.
    #[must_use]
    pub fn str_value(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    /// Returns the timestamp content of a column, if present and a timestamp.
    #[must_use]
    pub fn timestamp_value(&self, column: &str) -> Option<DateTime<Utc>> {
        self.get(column).and_then(Value::as_timestamp)
    }

    /// Returns the integer content of a column, if present and an int64.
    #[must_use]
    pub fn int_value(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_i64)
    }

    /// Builds the merge key for this row over the given key columns.
    ///
    /// # Errors
    ///
    /// Returns `Error::Constraint` if a key column is null, and
    /// `Error::InvalidInput` if a key column is absent or holds a value
    /// type that cannot be keyed (float, json).
    pub fn key<S: AsRef<str>>(&self, columns: &[S]) -> Result<RowKey> {
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            let name = column.as_ref();
            let value = self
                .get(name)
                .ok_or_else(|| Error::InvalidInput(format!("key column {name} is absent")))?;
            if value.is_null() {
                return Err(Error::constraint(format!("key column {name} is null")));
            }
            let repr = value.key_repr().ok_or_else(|| {
                Error::InvalidInput(format!(
                    "key column {name} has unkeyable type {}",
                    value.type_name()
                ))
            })?;
            parts.push(format!("{name}={repr}"));
        }
        Ok(RowKey(parts.join(",")))
    }

    /// Iterates over `(column, value)` pairs in column-name order.
    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An ordered batch of rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    rows: Vec<Row>,
}

impl Batch {
    /// Creates a new empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a batch from a vector of rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Appends a row to the batch.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Returns the rows in order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Consumes the batch, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the batch has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the maximum timestamp in the given column across all rows.
    ///
    /// Null, absent, and non-timestamp values are ignored. Returns `None`
    /// when no row holds a timestamp in that column.
    #[must_use]
    pub fn max_timestamp(&self, column: &str) -> Option<DateTime<Utc>> {
        self.rows
            .iter()
            .filter_map(|row| row.timestamp_value(column))
            .max()
    }
}

impl FromIterator<Row> for Batch {
    fn from_iter<T: IntoIterator<Item = Row>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}
