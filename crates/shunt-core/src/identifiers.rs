//! Scope identifiers carried by every migration.

use crate::newtype_string::define_identifier;

define_identifier! {
    /// Logical database a migration targets.
    pub struct Keyspace("keyspace");
}

define_identifier! {
    /// One shard of a keyspace (e.g. `0`, `-80`, `80-`).
    pub struct Shard("shard");
}

define_identifier! {
    /// Caller-supplied grouping token correlating migrations for
    /// `singleton-context` and `in-order-completion`.
    pub struct MigrationContext("migration context");
}

impl MigrationContext {
    /// Context assigned to a submission that did not name one. Every
    /// statement of the same submission shares it.
    pub fn generated(request_id: &str) -> Self {
        Self(format!("shunt:{}", request_id))
    }
}

#[cfg(test)]
#[path = "identifiers_test.rs"]
mod tests;
