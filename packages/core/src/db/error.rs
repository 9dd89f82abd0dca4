//! Database Error Types
//!
//! Error types for connection pinning and transaction execution against the
//! underlying libsql resource.

use thiserror::Error;

/// Database operation errors
///
/// Covers pin establishment and statement execution on the pinned
/// connection. Transaction bookkeeping errors (unbalanced rollback) live in
/// [`super::TransactionError`].
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Initial connection checkout failed; the pin remains unset
    #[error("Failed to pin connection: {source}")]
    PinFailed { source: libsql::Error },

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },
}

impl DatabaseError {
    /// Create a pin failure error
    pub fn pin_failed(source: libsql::Error) -> Self {
        Self::PinFailed { source }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }
}
