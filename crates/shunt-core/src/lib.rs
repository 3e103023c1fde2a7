//! shunt-core - Core library for Shunt
//!
//! This crate provides the shared vocabulary of the online schema-change
//! scheduler: the migration record and its lifecycle status, the strategy
//! string and its typed options, identifiers, artifact naming and the
//! `shunt.yml` configuration.

pub mod artifact;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod migration;
pub mod migration_uuid;
mod newtype_string;
pub(crate) mod serde_helpers;
pub mod status;
pub mod strategy;
pub mod table_name;

pub use artifact::{ArtifactKind, ArtifactName};
pub use config::{ArtifactConfig, Config, CutOverConfig, SchedulerConfig, TargetConfig, TargetDialect};
pub use error::{CoreError, CoreResult};
pub use identifiers::{Keyspace, MigrationContext, Shard};
pub use migration::{Migration, ObjectKind, PlanAction};
pub use migration_uuid::MigrationUuid;
pub use status::MigrationStatus;
pub use strategy::{DdlStrategySetting, MigrationOptions, OptionFlag, Strategy};
pub use table_name::TableName;
