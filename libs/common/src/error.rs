//! Custom error types for the common library
//!
//! This module defines the infrastructure error types shared by the
//! storefront repositories.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A stored row or document could not be decoded into its domain type
    #[error("Database decode error: {0}")]
    Decode(String),
}

impl DatabaseError {
    /// Classify a driver error as a connection or query failure.
    pub fn from_sqlx(err: SqlxError) -> Self {
        match err {
            SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
                DatabaseError::Connection(err)
            }
            SqlxError::ColumnDecode { .. } | SqlxError::Decode(_) => {
                DatabaseError::Decode(err.to_string())
            }
            other => DatabaseError::Query(other),
        }
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeouts_are_connection_errors() {
        let err = DatabaseError::from_sqlx(SqlxError::PoolTimedOut);
        assert!(matches!(err, DatabaseError::Connection(_)));
    }

    #[test]
    fn missing_rows_are_query_errors() {
        let err = DatabaseError::from_sqlx(SqlxError::RowNotFound);
        assert!(matches!(err, DatabaseError::Query(_)));
    }
}
