//! Embedded DDL for the migration store.
//!
//! Each schema version is a numbered `.sql` file embedded via `include_str!`.
//! The [`SCHEMA_VERSIONS`] array is ordered by version number and consumed by
//! [`crate::schema::apply_schema`].

/// A single schema version.
pub struct SchemaVersion {
    /// Sequential version number (1-based).
    pub version: i32,
    /// Raw SQL to execute.
    pub sql: &'static str,
}

/// All known schema versions, in order.
pub static SCHEMA_VERSIONS: &[SchemaVersion] = &[
    SchemaVersion {
        version: 1,
        sql: include_str!("v001_initial.sql"),
    },
];
