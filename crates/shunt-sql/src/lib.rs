//! shunt-sql - Statement analyzer for Shunt
//!
//! This crate wraps sqlparser-rs to classify DDL statements into a tagged
//! [`DdlAction`], split submission batches, normalize definitions for
//! comparison, model `CREATE TABLE` definitions, diff two definitions into an
//! `ALTER TABLE`, and apply an `ALTER TABLE` to a definition.

pub mod alter;
pub mod analyzer;
pub mod ddl;
pub mod definition;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod parser;
mod tokens;

pub use analyzer::StatementAnalyzer;
pub use ddl::{DdlAction, DdlStatement};
pub use definition::{Element, ElementKind, SchemaObject, TableDefinition, TableOption, ViewDefinition};
pub use dialect::{DuckDbDialect, MySqlDialect, SqlDialect};
pub use diff::ObjectDiff;
pub use error::{SqlError, SqlResult};
pub use parser::SqlParser;
