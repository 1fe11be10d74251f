//! CLI subcommands.

pub mod generate;
pub mod ingest;
pub mod run;
pub mod status;

use lode_core::Warehouse;

/// Closes the warehouse session, logging instead of failing.
pub(crate) async fn close_warehouse(warehouse: &dyn Warehouse) {
    if let Err(error) = warehouse.close().await {
        tracing::warn!(%error, "warehouse close failed");
    }
}
