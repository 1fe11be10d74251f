//! Error types for pipeline stages.

use std::path::PathBuf;

/// Convenience alias for pipeline results.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings are incomplete or inconsistent. Raised pre-flight, before
    /// any stage touches the warehouse.
    #[error("configuration error: {message}")]
    Config {
        /// What is missing or malformed.
        message: String,
    },

    /// The warehouse rejected an operation outside the merge step.
    #[error(transparent)]
    Warehouse(#[from] lode_core::Error),

    /// The conditional upsert into a target table failed.
    #[error("merge into {table} failed: {source}")]
    Merge {
        /// Target table of the failed merge.
        table: String,
        /// Underlying warehouse error.
        #[source]
        source: lode_core::Error,
    },

    /// A producer file could not be read or parsed.
    #[error("source file {}: {message}", path.display())]
    SourceFile {
        /// The offending file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}

impl Error {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a source-file error.
    pub fn source_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SourceFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
