//! Gold-layer aggregation over cleaned-layer deltas.
//!
//! Metrics are declared as data (`AggregateSpec`) and interpreted here;
//! no query text is ever assembled. Each aggregate batch stamps
//! `ingested_at` with the maximum source `ingested_at` of the delta, so
//! downstream watermarks advance exactly with the data processed.

use std::collections::HashMap;

use lode_core::{Batch, Predicate, Row, RowKey, Value};

use crate::error::Result;
use crate::tables::{self, INGESTED_AT};

/// How one metric column is computed within a group.
#[derive(Debug, Clone)]
pub enum Aggregation {
    /// Number of rows in the group.
    CountRows,
    /// Number of rows matching the predicate.
    CountWhere(Predicate),
    /// Average of `(end - start)` in fractional minutes. Rows where either
    /// side is null are skipped; a group with no usable pair yields null.
    AvgMinutesBetween {
        /// Column holding the interval start.
        start: String,
        /// Column holding the interval end.
        end: String,
    },
}

/// A named metric column.
#[derive(Debug, Clone)]
pub struct MetricDef {
    /// Output column name.
    pub name: String,
    /// How the value is computed.
    pub agg: Aggregation,
}

/// Columns derived from already-computed metrics of the same output row.
#[derive(Debug, Clone)]
pub enum Derived {
    /// `numerator / sum(denominators)`, `0` when the denominator is zero.
    SafeRatio {
        /// Output column name.
        name: String,
        /// Metric column supplying the numerator.
        numerator: String,
        /// Metric columns summed into the denominator.
        denominator: Vec<String>,
    },
    /// Boolean column that is true when a count metric equals `value`.
    CountEquals {
        /// Output column name.
        name: String,
        /// Metric column holding the count.
        count_column: String,
        /// Count that flips the flag.
        value: i64,
    },
}

impl Derived {
    fn name(&self) -> &str {
        match self {
            Self::SafeRatio { name, .. } | Self::CountEquals { name, .. } => name,
        }
    }
}

/// Grouping, metrics, and derived columns for one gold table.
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    /// Columns to group by.
    pub group_by: Vec<String>,
    /// Metric columns computed per group.
    pub metrics: Vec<MetricDef>,
    /// Columns derived from the computed metrics.
    pub derived: Vec<Derived>,
}

/// Groups the delta and computes one output row per group.
///
/// Rows missing any grouping column are skipped. Output rows are ordered
/// by group key so a given delta always aggregates to the same batch.
///
/// # Errors
///
/// Returns [`lode_core::Error::InvalidInput`] when a grouping column holds
/// an unkeyable value or a predicate is typed against the wrong column.
pub fn aggregate_delta(spec: &AggregateSpec, delta: &Batch) -> Result<Batch> {
    let stamp = delta
        .max_timestamp(INGESTED_AT)
        .map_or(Value::Null, Value::Timestamp);

    let mut order: Vec<RowKey> = Vec::new();
    let mut groups: HashMap<RowKey, Vec<&Row>> = HashMap::new();
    let mut skipped = 0usize;
    for row in delta.rows() {
        let complete = spec
            .group_by
            .iter()
            .all(|c| row.get(c).is_some_and(|v| !v.is_null()));
        if !complete {
            skipped += 1;
            continue;
        }
        let key = row.key(&spec.group_by)?;
        if let Some(group) = groups.get_mut(&key) {
            group.push(row);
        } else {
            order.push(key.clone());
            groups.insert(key, vec![row]);
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "rows without a full grouping key skipped");
    }
    order.sort();

    let mut out = Batch::new();
    for key in &order {
        let rows = &groups[key];
        let mut agg_row = Row::new();
        for column in &spec.group_by {
            let value = rows[0].get(column).cloned().unwrap_or(Value::Null);
            agg_row.set(column.clone(), value);
        }
        for metric in &spec.metrics {
            let value = compute(&metric.agg, rows)?;
            agg_row.set(metric.name.clone(), value);
        }
        for derived in &spec.derived {
            let value = derive(derived, &agg_row);
            agg_row.set(derived.name().to_string(), value);
        }
        agg_row.set(INGESTED_AT, stamp.clone());
        out.push(agg_row);
    }
    Ok(out)
}

fn compute(agg: &Aggregation, rows: &[&Row]) -> Result<Value> {
    match agg {
        Aggregation::CountRows => Ok(Value::Int64(rows.len() as i64)),
        Aggregation::CountWhere(predicate) => {
            let mut count = 0i64;
            for row in rows {
                if predicate.matches(row)? {
                    count += 1;
                }
            }
            Ok(Value::Int64(count))
        }
        Aggregation::AvgMinutesBetween { start, end } => {
            let mut total = 0f64;
            let mut counted = 0u32;
            for row in rows {
                let (Some(from), Some(to)) =
                    (row.timestamp_value(start), row.timestamp_value(end))
                else {
                    continue;
                };
                let micros = (to - from).num_microseconds().unwrap_or(0);
                total += micros as f64 / 60_000_000.0;
                counted += 1;
            }
            if counted == 0 {
                Ok(Value::Null)
            } else {
                Ok(Value::Float64(total / f64::from(counted)))
            }
        }
    }
}

fn derive(derived: &Derived, row: &Row) -> Value {
    match derived {
        Derived::SafeRatio {
            numerator,
            denominator,
            ..
        } => {
            let num = row.int_value(numerator).unwrap_or(0);
            let den: i64 = denominator
                .iter()
                .map(|c| row.int_value(c).unwrap_or(0))
                .sum();
            if den > 0 {
                Value::Float64(num as f64 / den as f64)
            } else {
                Value::Float64(0.0)
            }
        }
        Derived::CountEquals {
            count_column,
            value,
            ..
        } => Value::Boolean(row.int_value(count_column) == Some(*value)),
    }
}

fn count_of_type(event_type: &str) -> Aggregation {
    Aggregation::CountWhere(Predicate::Eq(
        "event_type".to_string(),
        Value::String(event_type.to_string()),
    ))
}

/// Metrics for `gold.user_metrics`, grouped by user.
#[must_use]
pub fn user_metric_spec() -> AggregateSpec {
    AggregateSpec {
        group_by: vec!["user_id".into()],
        metrics: vec![
            MetricDef {
                name: "total_events".into(),
                agg: Aggregation::CountRows,
            },
            MetricDef {
                name: "num_purchases".into(),
                agg: count_of_type(tables::PURCHASE),
            },
            MetricDef {
                name: "num_clicks".into(),
                agg: Aggregation::CountWhere(Predicate::In(
                    "event_type".into(),
                    tables::CLICK_TYPES
                        .iter()
                        .map(|t| Value::String((*t).to_string()))
                        .collect(),
                )),
            },
        ],
        derived: vec![Derived::SafeRatio {
            name: "conversion_rate".into(),
            numerator: "num_purchases".into(),
            denominator: vec!["num_clicks".into()],
        }],
    }
}

/// Metrics for `gold.session_metrics`, grouped by session and user.
#[must_use]
pub fn session_metric_spec() -> AggregateSpec {
    AggregateSpec {
        group_by: vec!["session_id".into(), "user_id".into()],
        metrics: vec![
            MetricDef {
                name: "num_events".into(),
                agg: Aggregation::CountRows,
            },
            MetricDef {
                name: "session_duration_minutes".into(),
                agg: Aggregation::AvgMinutesBetween {
                    start: "start_time".into(),
                    end: "end_time".into(),
                },
            },
        ],
        derived: vec![Derived::CountEquals {
            name: "is_bounce".into(),
            count_column: "num_events".into(),
            value: 1,
        }],
    }
}

/// Metrics for `gold.product_metrics`, grouped by product.
#[must_use]
pub fn product_metric_spec() -> AggregateSpec {
    AggregateSpec {
        group_by: vec!["product_id".into()],
        metrics: vec![
            MetricDef {
                name: "num_views".into(),
                agg: count_of_type(tables::VIEW_PRODUCT),
            },
            MetricDef {
                name: "num_add_to_cart".into(),
                agg: count_of_type(tables::ADD_TO_CART),
            },
            MetricDef {
                name: "num_purchases".into(),
                agg: count_of_type(tables::PURCHASE),
            },
        ],
        derived: vec![Derived::SafeRatio {
            name: "click_to_purchase_rate".into(),
            numerator: "num_purchases".into(),
            denominator: vec!["num_views".into(), "num_add_to_cart".into()],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn stamp(micros: i64) -> Value {
        Value::Timestamp(DateTime::from_timestamp_micros(micros).unwrap())
    }

    fn user_event(user: &str, event_type: &str, ingested: i64) -> Row {
        Row::new()
            .with("user_id", Value::String(user.into()))
            .with("event_type", Value::String(event_type.into()))
            .with(INGESTED_AT, stamp(ingested))
    }

    #[test]
    fn user_metrics_match_the_delta() {
        let delta = Batch::from_rows(vec![
            user_event("U1", "purchase", 10),
            user_event("U1", "add_to_cart", 20),
            user_event("U1", "add_to_cart", 30),
            user_event("U1", "view_product", 40),
        ]);
        let out = aggregate_delta(&user_metric_spec(), &delta).unwrap();

        assert_eq!(out.len(), 1);
        let row = &out.rows()[0];
        assert_eq!(row.int_value("total_events"), Some(4));
        assert_eq!(row.int_value("num_purchases"), Some(1));
        assert_eq!(row.int_value("num_clicks"), Some(3));
        let rate = row.get("conversion_rate").and_then(Value::as_f64).unwrap();
        assert!((rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_denominator_yields_zero_rate() {
        let delta = Batch::from_rows(vec![Row::new()
            .with("product_id", Value::String("PROD_001".into()))
            .with("event_type", Value::String("purchase".into()))
            .with(INGESTED_AT, stamp(10))]);
        let out = aggregate_delta(&product_metric_spec(), &delta).unwrap();

        let row = &out.rows()[0];
        assert_eq!(row.int_value("num_views"), Some(0));
        assert_eq!(row.int_value("num_add_to_cart"), Some(0));
        assert_eq!(row.int_value("num_purchases"), Some(1));
        assert_eq!(
            row.get("click_to_purchase_rate").and_then(Value::as_f64),
            Some(0.0)
        );
    }

    #[test]
    fn output_is_stamped_with_the_delta_maximum() {
        let delta = Batch::from_rows(vec![
            user_event("U1", "purchase", 300),
            user_event("U2", "view_product", 100),
        ]);
        let out = aggregate_delta(&user_metric_spec(), &delta).unwrap();
        assert_eq!(out.len(), 2);
        for row in out.rows() {
            assert_eq!(row.timestamp_value(INGESTED_AT), stamp(300).as_timestamp());
        }
    }

    #[test]
    fn session_duration_and_bounce_flags() {
        let session = |id: &str, events: usize| -> Vec<Row> {
            (0..events)
                .map(|i| {
                    Row::new()
                        .with("session_id", Value::String(id.into()))
                        .with("user_id", Value::String("user_1".into()))
                        .with("event_type", Value::String("view_product".into()))
                        .with("event_timestamp", stamp(i as i64))
                        .with("start_time", stamp(0))
                        .with("end_time", stamp(30 * 60 * 1_000_000))
                        .with(INGESTED_AT, stamp(99))
                })
                .collect()
        };
        let mut rows = session("sess_1", 3);
        rows.extend(session("sess_2", 1));
        let out = aggregate_delta(&session_metric_spec(), &Batch::from_rows(rows)).unwrap();

        assert_eq!(out.len(), 2);
        let by_id = |id: &str| {
            out.rows()
                .iter()
                .find(|r| r.str_value("session_id") == Some(id))
                .unwrap()
                .clone()
        };
        let full = by_id("sess_1");
        assert_eq!(full.int_value("num_events"), Some(3));
        assert_eq!(
            full.get("session_duration_minutes").and_then(Value::as_f64),
            Some(30.0)
        );
        assert_eq!(full.get("is_bounce").and_then(Value::as_bool), Some(false));

        let bounce = by_id("sess_2");
        assert_eq!(bounce.int_value("num_events"), Some(1));
        assert_eq!(bounce.get("is_bounce").and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn rows_without_a_group_key_are_skipped() {
        let delta = Batch::from_rows(vec![
            Row::new()
                .with("product_id", Value::Null)
                .with("event_type", Value::String("view_product".into()))
                .with(INGESTED_AT, stamp(10)),
            Row::new()
                .with("product_id", Value::String("PROD_002".into()))
                .with("event_type", Value::String("view_product".into()))
                .with(INGESTED_AT, stamp(20)),
        ]);
        let out = aggregate_delta(&product_metric_spec(), &delta).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.rows()[0].str_value("product_id"), Some("PROD_002"));
    }

    #[test]
    fn groups_come_out_sorted_by_key() {
        let delta = Batch::from_rows(vec![
            user_event("U9", "purchase", 10),
            user_event("U1", "purchase", 20),
            user_event("U5", "purchase", 30),
        ]);
        let out = aggregate_delta(&user_metric_spec(), &delta).unwrap();
        let users: Vec<_> = out
            .rows()
            .iter()
            .filter_map(|r| r.str_value("user_id"))
            .collect();
        assert_eq!(users, vec!["U1", "U5", "U9"]);
    }
}
