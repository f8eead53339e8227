//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Connection error
    #[error("connection error: {message}")]
    Connection {
        /// Connection error message
        message: String,
    },

    /// Storage handle already closed
    #[error("storage already closed")]
    AlreadyClosed,

    /// Close failed
    #[error("close error: {message}")]
    Close {
        /// Close error message
        message: String,
    },

    /// Table not found
    #[error("table not found: {table}")]
    NotFound {
        /// Table name that was not found
        table: String,
    },

    /// Schema introspection failed
    #[error("schema introspection error: {message}")]
    SchemaIntrospection {
        /// Introspection error message
        message: String,
    },

    /// Transaction already committed or rolled back
    #[error("transaction closed: {message}")]
    TransactionClosed {
        /// Why the transaction is unusable
        message: String,
    },

    /// A write failed inside a transaction
    #[error("write conflict: {message}")]
    WriteConflict {
        /// Write error message
        message: String,
    },

    /// Validation error
    #[error("validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Simulated fault (for DST)
    #[error("simulated fault: {fault_type}")]
    SimulatedFault {
        /// Type of simulated fault
        fault_type: String,
    },

    /// Internal error
    #[error("internal error: {message}")]
    Internal {
        /// Error message
        message: String,
    },
}

impl StorageError {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a close error.
    #[must_use]
    pub fn close(message: impl Into<String>) -> Self {
        Self::Close {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(table: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
        }
    }

    /// Create a schema introspection error.
    #[must_use]
    pub fn schema_introspection(message: impl Into<String>) -> Self {
        Self::SchemaIntrospection {
            message: message.into(),
        }
    }

    /// Create a transaction closed error.
    #[must_use]
    pub fn transaction_closed(message: impl Into<String>) -> Self {
        Self::TransactionClosed {
            message: message.into(),
        }
    }

    /// Create a write conflict error.
    #[must_use]
    pub fn write_conflict(message: impl Into<String>) -> Self {
        Self::WriteConflict {
            message: message.into(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a simulated fault error.
    #[must_use]
    pub fn simulated_fault(fault_type: impl Into<String>) -> Self {
        Self::SimulatedFault {
            fault_type: fault_type.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this is a transient error (can be retried).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::SimulatedFault { .. }
        )
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::connection(err.to_string())
            }
            sqlx::Error::RowNotFound => Self::not_found(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = StorageError::not_found("tests1");
        assert!(matches!(err, StorageError::NotFound { table } if table == "tests1"));

        let err = StorageError::validation("missing key column");
        assert!(
            matches!(err, StorageError::Validation { message } if message == "missing key column")
        );

        let err = StorageError::transaction_closed("already committed");
        assert!(matches!(err, StorageError::TransactionClosed { .. }));
    }

    #[test]
    fn test_is_transient() {
        assert!(StorageError::connection("failed").is_transient());
        assert!(StorageError::simulated_fault("commit_fail").is_transient());

        assert!(!StorageError::not_found("t").is_transient());
        assert!(!StorageError::validation("bad").is_transient());
        assert!(!StorageError::AlreadyClosed.is_transient());
        assert!(!StorageError::write_conflict("forced").is_transient());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            StorageError::not_found("pktests1").to_string(),
            "table not found: pktests1"
        );
        assert_eq!(StorageError::AlreadyClosed.to_string(), "storage already closed");
    }
}
