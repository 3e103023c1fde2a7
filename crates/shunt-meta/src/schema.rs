//! Schema version runner for the migration store.
//!
//! Tracks applied versions in `shunt_meta.schema_version` and applies any
//! missing ones on each open.

use crate::ddl::SCHEMA_VERSIONS;
use crate::error::{MetaError, MetaResult};
use duckdb::Connection;

/// Ensure the `shunt_meta` schema and `schema_version` table exist.
fn ensure_version_table(conn: &Connection) -> MetaResult<()> {
    conn.execute_batch(
        "CREATE SCHEMA IF NOT EXISTS shunt_meta;
         CREATE TABLE IF NOT EXISTS shunt_meta.schema_version (
             version    INTEGER NOT NULL,
             applied_at TIMESTAMP NOT NULL DEFAULT current_timestamp
         );",
    )
    .map_err(|e| {
        MetaError::MigrationError(format!("failed to create schema_version table: {e}"))
    })?;
    Ok(())
}

/// Return the highest applied schema version, or 0 if none.
pub fn current_version(conn: &Connection) -> MetaResult<i32> {
    let version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM shunt_meta.schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MetaError::MigrationError(format!("failed to read schema version: {e}")))?;
    Ok(version)
}

/// Apply every schema version newer than the recorded one.
pub fn apply_schema(conn: &Connection) -> MetaResult<()> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;

    for schema in SCHEMA_VERSIONS {
        if schema.version <= current {
            continue;
        }
        log::debug!("Applying store schema v{:03}", schema.version);

        conn.execute_batch(schema.sql).map_err(|e| {
            MetaError::MigrationError(format!("schema v{:03} failed: {e}", schema.version))
        })?;

        conn.execute(
            "INSERT INTO shunt_meta.schema_version (version) VALUES (?)",
            duckdb::params![schema.version],
        )
        .map_err(|e| {
            MetaError::MigrationError(format!(
                "failed to record schema v{:03}: {e}",
                schema.version
            ))
        })?;
    }
    Ok(())
}
