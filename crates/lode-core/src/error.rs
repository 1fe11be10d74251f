//! Error types and result aliases for lode.
//!
//! This module defines the shared error types used across all lode components.
//! Errors are structured for programmatic handling: retry logic only looks at
//! [`Error::is_transient`], everything else is context for operators.

/// The result type used throughout lode.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in lode operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A storage operation failed.
    ///
    /// This is the transient class: warehouse statements that fail with a
    /// storage error may succeed on retry.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The requested table or object was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A data constraint was violated, e.g. a null merge key.
    ///
    /// Constraint violations are never retried: the same statement against
    /// the same data fails the same way every time.
    #[error("constraint violation: {message}")]
    Constraint {
        /// Description of the violated constraint.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new constraint violation error.
    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    /// Returns true if retrying the failed operation could succeed.
    ///
    /// Only storage-layer faults qualify. Constraint violations, invalid
    /// input, and serialization failures are deterministic and retrying
    /// them would just repeat the failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
