//! Error types for the record store
//!
//! Every failure surfaces as a [`StoreError`]. Engine failures are wrapped into
//! one of these kinds and never collapsed into an empty result.

/// Result type alias for record store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error kinds for record store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be opened or reached
    #[error("Connection error: {message}")]
    ConnectionError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Caller supplied an unusable argument (empty value set, bad identifier)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An existing table has a different shape than the one requested
    #[error("Schema conflict on table {table}: {message}")]
    SchemaConflict { table: String, message: String },

    /// A uniqueness or primary-key constraint rejected the statement
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A raw row did not have the same arity as the column list
    #[error("Schema mismatch: expected {expected} columns, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// Operation attempted while the accessor is disconnected
    #[error("Not connected to a store")]
    NotConnected,

    /// Operation exceeded its deadline
    #[error("Operation timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Any other engine failure (unknown table, malformed type, ...)
    #[error("Query execution error: {0}")]
    Query(String),
}

impl StoreError {
    /// Create a connection error without an underlying source
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        StoreError::ConnectionError {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping the engine's error
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        StoreError::ConnectionError {
            message: msg.into(),
            source: Some(source),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        StoreError::InvalidArgument(msg.into())
    }

    /// Create a schema conflict error
    pub fn schema_conflict(table: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::SchemaConflict {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(expected: usize, actual: usize) -> Self {
        StoreError::SchemaMismatch { expected, actual }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        StoreError::Timeout { timeout_ms }
    }

    /// Create a query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        StoreError::Query(msg.into())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
            _ => None,
        };

        match code {
            Some(ErrorCode::ConstraintViolation) => StoreError::ConstraintViolation(err.to_string()),
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
                | ErrorCode::ReadOnly,
            ) => StoreError::connection_with_source(err.to_string(), Box::new(err)),
            // Only raised when the engine interrupts a statement past its deadline
            Some(ErrorCode::OperationInterrupted) => StoreError::Timeout { timeout_ms: 0 },
            _ => StoreError::Query(err.to_string()),
        }
    }
}
