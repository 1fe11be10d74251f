//! Logging setup and span helpers.
//!
//! Every pipeline binary calls [`init_logging`] once at startup; library
//! code only emits `tracing` events and spans and never installs a
//! subscriber of its own.

use std::sync::Once;

use tracing::{Span, info_span};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Output format for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Machine-readable JSON lines, one event per line.
    Json,
    /// Human-readable output for terminals.
    #[default]
    Pretty,
}

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set and defaults to `info`.
/// Calling this more than once is safe; later calls are no-ops.
///
/// # Examples
///
/// ```
/// lode_core::init_logging(lode_core::LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        match format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .json()
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
            }
        }
    });
}

/// Span covering one stage run (silver or gold) of the pipeline.
#[must_use]
pub fn stage_span(stage: &str, run_id: &str) -> Span {
    info_span!("stage_run", stage, run_id)
}

/// Span covering one step (a single target table) within a stage.
#[must_use]
pub fn step_span(stage: &str, entity: &str) -> Span {
    info_span!("step", stage, entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn spans_are_named_for_their_scope() {
        init_logging(LogFormat::Pretty);
        let stage = stage_span("silver", "2f1a77");
        assert_eq!(stage.metadata().map(|m| m.name()), Some("stage_run"));
        let step = step_span("gold", "user_metrics");
        assert_eq!(step.metadata().map(|m| m.name()), Some("step"));
    }
}
