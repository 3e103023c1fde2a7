//! Store connection wrapper.
//!
//! [`DuckDbStore`] owns a DuckDB [`Connection`] behind a mutex and provides
//! helpers for opening, upgrading and transacting against the store. Every
//! store operation holds the lock for exactly one statement or one
//! transaction, never across an await point.

use crate::error::{MetaError, MetaResult};
use crate::schema::apply_schema;
use duckdb::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// DuckDB-backed migration store for one shard.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Open (or create) the store at `path` and apply pending schema versions.
    pub fn open(path: &Path) -> MetaResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                MetaError::ConnectionError(format!("{e}: {}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| MetaError::ConnectionError(format!("{e}: {}", path.display())))?;
        apply_schema(&conn)?;
        log::debug!("Opened migration store {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store with the schema applied.
    ///
    /// Useful for tests and dry runs that don't need persistence.
    pub fn open_memory() -> MetaResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| MetaError::ConnectionError(e.to_string()))?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the underlying DuckDB connection.
    pub(crate) fn conn(&self) -> MetaResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| MetaError::MutexPoisoned(e.to_string()))
    }

    /// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back on
    /// error.
    pub(crate) fn transaction<F, T>(&self, body: F) -> MetaResult<T>
    where
        F: FnOnce(&Connection) -> MetaResult<T>,
    {
        let conn = self.conn()?;
        conn.execute_batch("BEGIN TRANSACTION")
            .map_err(|e| MetaError::TransactionError(format!("BEGIN failed: {e}")))?;

        let result = body(&conn);

        match &result {
            Ok(_) => {
                if let Err(commit_err) = conn.execute_batch("COMMIT") {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(MetaError::TransactionError(format!(
                        "COMMIT failed: {commit_err}"
                    )));
                }
            }
            Err(_) => {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
        result
    }

    /// Run a conditional single-statement update; true when a row changed.
    pub(crate) fn update(
        &self,
        what: &str,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> MetaResult<bool> {
        let changed = self
            .conn()?
            .execute(sql, params)
            .map_err(|e| MetaError::QueryError(format!("{what}: {e}")))?;
        Ok(changed > 0)
    }

    /// Run a single-statement update; number of changed rows.
    pub(crate) fn update_many(
        &self,
        what: &str,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> MetaResult<usize> {
        self.conn()?
            .execute(sql, params)
            .map_err(|e| MetaError::QueryError(format!("{what}: {e}")))
    }

    /// Query a single i64 value (COUNT(*) style).
    pub fn count(&self, sql: &str) -> MetaResult<i64> {
        let value = self.conn()?.query_row(sql, [], |row| row.get::<_, i64>(0))?;
        Ok(value)
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
