//! Error types for layoutbench
//!
//! Provides a unified error type for codecs, strategies and the bucket store.

use thiserror::Error;

/// Result type alias using LayoutError
pub type Result<T> = std::result::Result<T, LayoutError>;

/// Unified error type for layoutbench operations
#[derive(Debug, Error)]
pub enum LayoutError {
    // -------------------------------------------------------------------------
    // Strategy Errors
    // -------------------------------------------------------------------------
    #[error("Record {id} not found")]
    NotFound { id: i64 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Type mismatch for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Field {field:?} is not supported for {operation}")]
    UnsupportedField {
        field: String,
        operation: &'static str,
    },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LayoutError {
    /// Shorthand for a missing top-level or nested bucket
    pub(crate) fn bucket_not_found(name: &[u8]) -> Self {
        LayoutError::Store(format!(
            "bucket {} not found",
            String::from_utf8_lossy(name)
        ))
    }

    /// Shorthand for an update on a field with no write path
    pub(crate) fn not_updatable(field: &str) -> Self {
        LayoutError::UnsupportedField {
            field: field.to_string(),
            operation: "update",
        }
    }

    /// Shorthand for an aggregate on a non-numeric or unknown field
    pub(crate) fn not_summable(field: &str) -> Self {
        LayoutError::UnsupportedField {
            field: field.to_string(),
            operation: "sum",
        }
    }
}
