//! Typed filter predicates and merge specifications.
//!
//! Filters and merge shapes are plain data interpreted by the warehouse,
//! never interpolated query text. That keeps match predicates and column
//! sets testable as values and closes off injection through table or
//! column names.

use serde::{Deserialize, Serialize};

use crate::batch::Row;
use crate::error::{Error, Result};
use crate::value::Value;

/// A single filter predicate over one column.
///
/// Null comparison follows SQL: a null (or absent) operand makes `Eq`,
/// `In`, and `Gt` evaluate to false rather than matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// Column equals the given value.
    Eq(String, Value),
    /// Column equals one of the given values.
    In(String, Vec<Value>),
    /// Column is strictly greater than the given value.
    Gt(String, Value),
    /// Column is present and non-null.
    IsNotNull(String),
}

impl Predicate {
    /// Evaluates the predicate against a row.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` when the row value and the predicate
    /// operand are both non-null but of different types, or when `Gt` is
    /// applied to an unorderable type (boolean, json).
    pub fn matches(&self, row: &Row) -> Result<bool> {
        match self {
            Self::Eq(column, expected) => eq_matches(row, column, expected),
            Self::In(column, values) => {
                for expected in values {
                    if eq_matches(row, column, expected)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Gt(column, bound) => gt_matches(row, column, bound),
            Self::IsNotNull(column) => Ok(row.get(column).is_some_and(|v| !v.is_null())),
        }
    }
}

/// Evaluates a conjunction of predicates against a row.
///
/// An empty filter list matches every row.
///
/// # Errors
///
/// Propagates the first evaluation error from [`Predicate::matches`].
pub fn matches_all(row: &Row, filters: &[Predicate]) -> Result<bool> {
    for filter in filters {
        if !filter.matches(row)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eq_matches(row: &Row, column: &str, expected: &Value) -> Result<bool> {
    let Some(actual) = row.get(column) else {
        return Ok(false);
    };
    if actual.is_null() || expected.is_null() {
        return Ok(false);
    }
    check_same_type(column, actual, expected)?;
    Ok(actual == expected)
}

fn gt_matches(row: &Row, column: &str, bound: &Value) -> Result<bool> {
    let Some(actual) = row.get(column) else {
        return Ok(false);
    };
    if actual.is_null() || bound.is_null() {
        return Ok(false);
    }
    check_same_type(column, actual, bound)?;
    match (actual, bound) {
        (Value::Int64(a), Value::Int64(b)) => Ok(a > b),
        (Value::Float64(a), Value::Float64(b)) => Ok(a > b),
        (Value::String(a), Value::String(b)) => Ok(a > b),
        (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a > b),
        _ => Err(Error::InvalidInput(format!(
            "column {column} of type {} is not orderable",
            actual.type_name()
        ))),
    }
}

fn check_same_type(column: &str, actual: &Value, expected: &Value) -> Result<()> {
    if std::mem::discriminant(actual) == std::mem::discriminant(expected) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "predicate on column {column} compares {} against {}",
            expected.type_name(),
            actual.type_name()
        )))
    }
}

/// The shape of a conditional upsert: which columns match, which are
/// rewritten on match, and which are written on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSpec {
    /// Columns forming the match key, in significance order.
    pub key_columns: Vec<String>,
    /// Columns rewritten when a staged row matches a target row.
    pub update_columns: Vec<String>,
    /// Columns written when a staged row has no match.
    pub insert_columns: Vec<String>,
}

impl MergeSpec {
    /// Builds the common upsert shape: match on `key_columns`, insert every
    /// listed column, update every listed column except the keys.
    #[must_use]
    pub fn upsert(key_columns: &[&str], columns: &[&str]) -> Self {
        let keys: Vec<String> = key_columns.iter().map(ToString::to_string).collect();
        let update_columns = columns
            .iter()
            .filter(|c| !key_columns.contains(c))
            .map(ToString::to_string)
            .collect();
        let insert_columns = columns.iter().map(ToString::to_string).collect();
        Self {
            key_columns: keys,
            update_columns,
            insert_columns,
        }
    }

    /// Validates internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` when the key set is empty, a key
    /// column is missing from the insert set, or a key column appears in
    /// the update set (keys are immutable under merge).
    pub fn validate(&self) -> Result<()> {
        if self.key_columns.is_empty() {
            return Err(Error::InvalidInput(
                "merge spec has no key columns".to_string(),
            ));
        }
        for key in &self.key_columns {
            if !self.insert_columns.contains(key) {
                return Err(Error::InvalidInput(format!(
                    "key column {key} is missing from the insert set"
                )));
            }
            if self.update_columns.contains(key) {
                return Err(Error::InvalidInput(format!(
                    "key column {key} cannot be updated"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn eq_matches_same_type_values() {
        let row = Row::new().with("event_type", Value::String("purchase".into()));
        let hit = Predicate::Eq("event_type".into(), Value::String("purchase".into()));
        let miss = Predicate::Eq("event_type".into(), Value::String("view_product".into()));
        assert!(hit.matches(&row).unwrap());
        assert!(!miss.matches(&row).unwrap());
    }

    #[test]
    fn null_operands_never_match() {
        let row = Row::new().with("product_id", Value::Null);
        let eq = Predicate::Eq("product_id".into(), Value::String("PROD_001".into()));
        let gt = Predicate::Gt("product_id".into(), Value::String("PROD_001".into()));
        assert!(!eq.matches(&row).unwrap());
        assert!(!gt.matches(&row).unwrap());

        let absent = Row::new();
        assert!(!eq.matches(&absent).unwrap());
    }

    #[test]
    fn type_mismatch_is_an_error_not_a_miss() {
        let row = Row::new().with("event_id", Value::Int64(7));
        let pred = Predicate::Eq("event_id".into(), Value::String("7".into()));
        assert!(matches!(
            pred.matches(&row),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn gt_orders_timestamps() {
        let earlier = Utc.with_ymd_and_hms(2026, 8, 25, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 8, 25, 9, 0, 0).unwrap();
        let row = Row::new().with("ingested_at", Value::Timestamp(later));
        let pred = Predicate::Gt("ingested_at".into(), Value::Timestamp(earlier));
        assert!(pred.matches(&row).unwrap());

        let boundary = Row::new().with("ingested_at", Value::Timestamp(earlier));
        assert!(!pred.matches(&boundary).unwrap());
    }

    #[test]
    fn in_matches_any_listed_value() {
        let row = Row::new().with("event_type", Value::String("add_to_cart".into()));
        let pred = Predicate::In(
            "event_type".into(),
            vec![
                Value::String("view_product".into()),
                Value::String("add_to_cart".into()),
            ],
        );
        assert!(pred.matches(&row).unwrap());
    }

    #[test]
    fn is_not_null_distinguishes_null_from_present() {
        let pred = Predicate::IsNotNull("user_id".into());
        let present = Row::new().with("user_id", Value::String("user_1".into()));
        let null = Row::new().with("user_id", Value::Null);
        assert!(pred.matches(&present).unwrap());
        assert!(!pred.matches(&null).unwrap());
        assert!(!pred.matches(&Row::new()).unwrap());
    }

    #[test]
    fn matches_all_is_conjunctive_and_empty_matches() {
        let row = Row::new()
            .with("event_type", Value::String("purchase".into()))
            .with("event_id", Value::Int64(3));
        let filters = vec![
            Predicate::Eq("event_type".into(), Value::String("purchase".into())),
            Predicate::Gt("event_id".into(), Value::Int64(2)),
        ];
        assert!(matches_all(&row, &filters).unwrap());
        assert!(matches_all(&row, &[]).unwrap());

        let filters = vec![
            Predicate::Eq("event_type".into(), Value::String("purchase".into())),
            Predicate::Gt("event_id".into(), Value::Int64(3)),
        ];
        assert!(!matches_all(&row, &filters).unwrap());
    }

    #[test]
    fn upsert_spec_excludes_keys_from_update_set() {
        let spec = MergeSpec::upsert(
            &["event_id"],
            &["event_id", "user_id", "event_type", "ingested_at"],
        );
        assert_eq!(spec.key_columns, vec!["event_id"]);
        assert_eq!(spec.update_columns, vec!["user_id", "event_type", "ingested_at"]);
        assert_eq!(
            spec.insert_columns,
            vec!["event_id", "user_id", "event_type", "ingested_at"]
        );
        spec.validate().unwrap();
    }

    #[test]
    fn validate_rejects_degenerate_specs() {
        let no_keys = MergeSpec {
            key_columns: vec![],
            update_columns: vec!["a".into()],
            insert_columns: vec!["a".into()],
        };
        assert!(no_keys.validate().is_err());

        let key_not_inserted = MergeSpec {
            key_columns: vec!["id".into()],
            update_columns: vec![],
            insert_columns: vec!["other".into()],
        };
        assert!(key_not_inserted.validate().is_err());

        let key_updated = MergeSpec {
            key_columns: vec!["id".into()],
            update_columns: vec!["id".into()],
            insert_columns: vec!["id".into()],
        };
        assert!(key_updated.validate().is_err());
    }
}
