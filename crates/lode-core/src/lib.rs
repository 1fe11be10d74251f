//! # lode-core
//!
//! Core warehouse abstractions for the Lode incremental ETL engine.
//!
//! This crate provides the pieces every pipeline stage builds on:
//!
//! - **Values and Rows**: Dynamically typed cells with canonical key encoding
//! - **Warehouse Trait**: Async table storage with scan, overwrite, and merge
//! - **Backends**: An in-memory warehouse for tests and a Parquet-backed local one
//! - **Query Types**: Typed predicates and merge specifications
//! - **Retry and Logging**: Transient-failure retry and tracing setup
//!
//! ## Example
//!
//! ```rust
//! use lode_core::prelude::*;
//!
//! let table = TableRef::new("bronze", "events");
//! let schema = TableSchema::new()
//!     .with("event_id", DataType::Int64)
//!     .with("event_type", DataType::String);
//! assert_eq!(table.to_string(), "bronze.events");
//! assert!(schema.contains("event_id"));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod local;
pub mod observability;
mod parquet;
pub mod query;
pub mod retry;
pub mod table;
pub mod value;
pub mod warehouse;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use lode_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::batch::{Batch, Row, RowKey};
    pub use crate::error::{Error, Result};
    pub use crate::local::LocalWarehouse;
    pub use crate::observability::{LogFormat, init_logging, stage_span, step_span};
    pub use crate::query::{MergeSpec, Predicate, matches_all};
    pub use crate::retry::{RetryPolicy, retry_transient};
    pub use crate::table::{Column, TableRef, TableSchema};
    pub use crate::value::{DataType, Value, parse_timestamp, utc_now_micros};
    pub use crate::warehouse::{MemoryWarehouse, MergeOutcome, Warehouse};
}

// Re-export key types at crate root for ergonomics
pub use batch::{Batch, Row, RowKey};
pub use error::{Error, Result};
pub use local::LocalWarehouse;
pub use observability::{LogFormat, init_logging, stage_span, step_span};
pub use query::{MergeSpec, Predicate, matches_all};
pub use retry::{RetryPolicy, retry_transient};
pub use table::{Column, TableRef, TableSchema};
pub use value::{DataType, Value, parse_timestamp, utc_now_micros};
pub use warehouse::{MemoryWarehouse, MergeOutcome, Warehouse};
