//! Error types for the migration store.

use thiserror::Error;

/// Migration store errors.
#[derive(Error, Debug)]
pub enum MetaError {
    /// Failed to open or create the store (M001).
    #[error("[M001] Migration store connection failed: {0}")]
    ConnectionError(String),

    /// Schema migration failed (M002).
    #[error("[M002] Migration store schema migration failed: {0}")]
    MigrationError(String),

    /// SQL execution error inside the store (M003).
    #[error("[M003] Migration store query failed: {0}")]
    QueryError(String),

    /// Transaction management error (M004).
    #[error("[M004] Migration store transaction failed: {0}")]
    TransactionError(String),

    /// A persisted row could not be decoded (M005).
    #[error("[M005] Corrupt migration record {uuid}: {reason}")]
    CorruptRecord { uuid: String, reason: String },

    /// A record with this uuid already exists (M006).
    #[error("[M006] Migration {0} already exists")]
    DuplicateMigration(String),

    /// The connection lock was poisoned by a panicking holder (M007).
    #[error("[M007] Migration store lock poisoned: {0}")]
    MutexPoisoned(String),

    /// DuckDB driver error with preserved source chain (M008).
    #[error("[M008] DuckDB error")]
    DuckDb(#[source] duckdb::Error),
}

/// Result type alias for [`MetaError`].
pub type MetaResult<T> = Result<T, MetaError>;

impl From<duckdb::Error> for MetaError {
    fn from(err: duckdb::Error) -> Self {
        MetaError::DuckDb(err)
    }
}

/// Attach the failing operation to a raw DuckDB error.
pub(crate) trait MetaResultExt<T> {
    fn query_context(self, what: &str) -> MetaResult<T>;
}

impl<T> MetaResultExt<T> for Result<T, duckdb::Error> {
    fn query_context(self, what: &str) -> MetaResult<T> {
        self.map_err(|e| MetaError::QueryError(format!("{what}: {e}")))
    }
}
