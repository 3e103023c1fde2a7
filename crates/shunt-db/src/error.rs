//! Error types for shunt-db

use shunt_sql::SqlError;
use thiserror::Error;

/// Engine and inspector errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Statement execution error (D002)
    #[error("[D002] SQL execution failed: {0}")]
    ExecutionError(String),

    /// Object not found (D003)
    #[error("[D003] Table or view not found: {0}")]
    ObjectNotFound(String),

    /// Object already exists (D004)
    #[error("[D004] Table or view already exists: {0}")]
    ObjectExists(String),

    /// Execution stopped at a cancellation checkpoint (D005)
    #[error("[D005] Execution cancelled")]
    Cancelled,

    /// Lost contact with the target; safe to retry (D006)
    #[error("[D006] Transient failure: {0}")]
    Transient(String),

    /// Plan cannot be executed by this engine (D007)
    #[error("[D007] Invalid execution plan: {0}")]
    InvalidPlan(String),

    /// Mutex poisoned (D008)
    #[error("[D008] Engine mutex poisoned: {0}")]
    MutexPoisoned(String),

    /// Statement analysis failed (D009)
    #[error("[D009] {0}")]
    Sql(#[from] SqlError),

    /// Internal error (D010)
    #[error("[D010] Internal engine error: {0}")]
    Internal(String),
}

impl DbError {
    /// Whether retrying the same execution may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Transient(_) | DbError::ConnectionError(_))
    }
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error carries no structured catalog variants; classify by
        // message with narrow patterns.
        let msg = err.to_string();
        if msg.contains("already exists") {
            DbError::ObjectExists(msg)
        } else if msg.contains("Table with name")
            || msg.contains("View with name")
            || msg.contains("Table or view with name")
            || (msg.contains("Catalog Error") && msg.contains("does not exist"))
        {
            DbError::ObjectNotFound(msg)
        } else {
            DbError::ExecutionError(msg)
        }
    }
}
