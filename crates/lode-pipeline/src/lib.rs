//! # lode-pipeline
//!
//! Incremental bronze to silver to gold pipeline stages.
//!
//! The crate wires the core warehouse abstractions into the medallion
//! flow:
//!
//! - **Watermark + Extractor**: bound each run to rows newer than the
//!   target's high-water mark
//! - **Cleaners**: validate, normalize, and deduplicate raw events and
//!   flatten nested sessions
//! - **Merge Engine**: staged conditional upsert with bootstrap and
//!   transient-error retry
//! - **Aggregator**: declarative per-entity metrics over the cleaned delta
//! - **Coordinator**: stage sequencing, idempotent DDL, and session
//!   lifecycle
//! - **Ingestion + Generator**: producer files into bronze, and synthetic
//!   producer files for development
//!
//! ## Example
//!
//! ```rust
//! use lode_pipeline::prelude::*;
//!
//! let spec = user_metric_spec();
//! assert_eq!(spec.group_by, vec!["user_id"]);
//!
//! // The local backend refuses to run without a data directory.
//! assert!(Settings::default().validate().is_err());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod aggregate;
pub mod clean;
pub mod coordinator;
pub mod error;
pub mod extract;
mod gold;
pub mod ingest;
pub mod merge;
pub mod records;
pub mod settings;
mod silver;
pub mod synth;
pub mod tables;
pub mod watermark;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use lode_pipeline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{
        AggregateSpec, Aggregation, Derived, MetricDef, aggregate_delta, product_metric_spec,
        session_metric_spec, user_metric_spec,
    };
    pub use crate::clean::{clean_events, flatten_sessions};
    pub use crate::coordinator::{
        Coordinator, GoldStep, SilverStep, StageReport, StepOutcome, StepRun,
    };
    pub use crate::error::{Error, Result};
    pub use crate::extract::extract_delta;
    pub use crate::ingest::{ingest_events_csv, ingest_sessions_json};
    pub use crate::merge::MergeEngine;
    pub use crate::records::{Device, Location, RawEvent, RawSession, SessionEvent};
    pub use crate::settings::{BackendKind, Settings};
    pub use crate::synth::{Generator, write_events_csv, write_sessions_json};
    pub use crate::watermark::{WATERMARK_SENTINEL, last_ingested_at};
}

// Re-export key types at crate root for ergonomics
pub use coordinator::{Coordinator, GoldStep, SilverStep, StageReport, StepOutcome, StepRun};
pub use error::{Error, Result};
pub use merge::MergeEngine;
pub use settings::{BackendKind, Settings};
