//! Table definitions for every layer of the warehouse.
//!
//! All DDL lives here: the seven durable tables (bronze, silver, gold),
//! their schemas, and the staging-table naming rule. Stage code refers to
//! tables only through these functions.

use lode_core::{DataType, TableRef, TableSchema};

/// Progress column shared by every table in the warehouse.
pub const INGESTED_AT: &str = "ingested_at";

/// Event type recorded for completed purchases.
pub const PURCHASE: &str = "purchase";
/// Event type recorded for product page views.
pub const VIEW_PRODUCT: &str = "view_product";
/// Event type recorded when a product is added to the cart.
pub const ADD_TO_CART: &str = "add_to_cart";
/// Event type recorded when a product is removed from the cart.
pub const REMOVE_FROM_CART: &str = "remove_from_cart";

/// Click-style event types counted toward `num_clicks`.
pub const CLICK_TYPES: [&str; 3] = [VIEW_PRODUCT, ADD_TO_CART, REMOVE_FROM_CART];

/// Raw events landed by ingestion.
#[must_use]
pub fn bronze_events() -> TableRef {
    TableRef::new("bronze", "events")
}

/// Raw sessions landed by ingestion, nested payloads kept as JSON.
#[must_use]
pub fn bronze_sessions() -> TableRef {
    TableRef::new("bronze", "sessions")
}

/// Cleaned, deduplicated events keyed by `event_id`.
#[must_use]
pub fn silver_events() -> TableRef {
    TableRef::new("silver", "events_cleaned")
}

/// Session events flattened to one row per (session, type, timestamp).
#[must_use]
pub fn silver_session_events() -> TableRef {
    TableRef::new("silver", "session_events")
}

/// Per-user metrics keyed by `user_id`.
#[must_use]
pub fn gold_user_metrics() -> TableRef {
    TableRef::new("gold", "user_metrics")
}

/// Per-session metrics keyed by `session_id`.
#[must_use]
pub fn gold_session_metrics() -> TableRef {
    TableRef::new("gold", "session_metrics")
}

/// Per-product metrics keyed by `product_id`.
#[must_use]
pub fn gold_product_metrics() -> TableRef {
    TableRef::new("gold", "product_metrics")
}

/// Staging table backing a merge into `target`.
///
/// Every merge target gets its own staging table so concurrent stages never
/// share one; the table is overwritten wholesale on each run.
#[must_use]
pub fn staging_for(target: &TableRef) -> TableRef {
    TableRef::new("staging", format!("{}_{}", target.schema, target.name))
}

/// Schema of [`bronze_events`].
#[must_use]
pub fn bronze_events_schema() -> TableSchema {
    TableSchema::new()
        .with("event_id", DataType::Int64)
        .with("user_id", DataType::String)
        .with("event_type", DataType::String)
        .with("product_id", DataType::String)
        .with("timestamp", DataType::Timestamp)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Schema of [`bronze_sessions`].
#[must_use]
pub fn bronze_sessions_schema() -> TableSchema {
    TableSchema::new()
        .with("session_id", DataType::String)
        .with("user_id", DataType::String)
        .with("start_time", DataType::Timestamp)
        .with("end_time", DataType::Timestamp)
        .with("device", DataType::Json)
        .with("location", DataType::Json)
        .with("events", DataType::Json)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Schema of [`silver_events`].
#[must_use]
pub fn silver_events_schema() -> TableSchema {
    TableSchema::new()
        .with("event_id", DataType::Int64)
        .with("user_id", DataType::String)
        .with("event_type", DataType::String)
        .with("product_id", DataType::String)
        .with("timestamp", DataType::Timestamp)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Schema of [`silver_session_events`].
#[must_use]
pub fn silver_session_events_schema() -> TableSchema {
    TableSchema::new()
        .with("session_id", DataType::String)
        .with("event_type", DataType::String)
        .with("event_timestamp", DataType::Timestamp)
        .with("user_id", DataType::String)
        .with("start_time", DataType::Timestamp)
        .with("end_time", DataType::Timestamp)
        .with("product_id", DataType::String)
        .with("browser", DataType::String)
        .with("operating_system", DataType::String)
        .with("country", DataType::String)
        .with("city", DataType::String)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Schema of [`gold_user_metrics`].
#[must_use]
pub fn gold_user_metrics_schema() -> TableSchema {
    TableSchema::new()
        .with("user_id", DataType::String)
        .with("total_events", DataType::Int64)
        .with("num_purchases", DataType::Int64)
        .with("num_clicks", DataType::Int64)
        .with("conversion_rate", DataType::Float64)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Schema of [`gold_session_metrics`].
#[must_use]
pub fn gold_session_metrics_schema() -> TableSchema {
    TableSchema::new()
        .with("session_id", DataType::String)
        .with("user_id", DataType::String)
        .with("session_duration_minutes", DataType::Float64)
        .with("num_events", DataType::Int64)
        .with("is_bounce", DataType::Boolean)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Schema of [`gold_product_metrics`].
#[must_use]
pub fn gold_product_metrics_schema() -> TableSchema {
    TableSchema::new()
        .with("product_id", DataType::String)
        .with("num_views", DataType::Int64)
        .with("num_add_to_cart", DataType::Int64)
        .with("num_purchases", DataType::Int64)
        .with("click_to_purchase_rate", DataType::Float64)
        .with(INGESTED_AT, DataType::Timestamp)
}

/// Bronze tables paired with their schemas.
#[must_use]
pub fn bronze_tables() -> Vec<(TableRef, TableSchema)> {
    vec![
        (bronze_events(), bronze_events_schema()),
        (bronze_sessions(), bronze_sessions_schema()),
    ]
}

/// Silver tables paired with their schemas.
#[must_use]
pub fn silver_tables() -> Vec<(TableRef, TableSchema)> {
    vec![
        (silver_events(), silver_events_schema()),
        (silver_session_events(), silver_session_events_schema()),
    ]
}

/// Gold tables paired with their schemas.
#[must_use]
pub fn gold_tables() -> Vec<(TableRef, TableSchema)> {
    vec![
        (gold_user_metrics(), gold_user_metrics_schema()),
        (gold_session_metrics(), gold_session_metrics_schema()),
        (gold_product_metrics(), gold_product_metrics_schema()),
    ]
}

/// Every durable table paired with its schema, bronze through gold.
#[must_use]
pub fn all_tables() -> Vec<(TableRef, TableSchema)> {
    let mut tables = bronze_tables();
    tables.extend(silver_tables());
    tables.extend(gold_tables());
    tables
}
