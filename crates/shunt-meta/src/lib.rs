//! Migration store for Shunt.
//!
//! The [`MigrationStore`] contract is the single source of truth for
//! migration state. [`DuckDbStore`] implements it on one DuckDB file per
//! shard, with the schema evolved through embedded, versioned SQL files.

pub mod connection;
pub mod ddl;
pub mod error;
mod records;
pub(crate) mod row_helpers;
pub mod schema;
pub mod store;

pub use connection::DuckDbStore;
pub use error::{MetaError, MetaResult};
pub use store::{MigrationFilter, MigrationStore};
