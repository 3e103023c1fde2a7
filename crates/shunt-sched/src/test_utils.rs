//! Shared test utilities for shunt-sched

use chrono::{DateTime, TimeZone, Utc};
use shunt_core::{
    DdlStrategySetting, Keyspace, Migration, MigrationContext, MigrationStatus, MigrationUuid,
    ObjectKind, Shard, TableName,
};

/// A fixed instant `secs` seconds into the test epoch.
pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_790_000_000 + secs, 0).unwrap()
}

/// A queued ALTER on `table` with the given strategy string.
pub(crate) fn make_migration(table: &str, strategy: &str) -> Migration {
    let setting = DdlStrategySetting::parse(strategy).unwrap();
    Migration::new(
        MigrationUuid::generate(),
        Keyspace::parse("commerce").unwrap(),
        Shard::parse("0").unwrap(),
        TableName::new(table),
        ObjectKind::Table,
        format!("ALTER TABLE {} ADD COLUMN c int", table),
        setting.strategy,
        setting.options,
        MigrationContext::parse("ctx").unwrap(),
        at(0),
    )
}

/// Same as [`make_migration`] with a status and sequence number.
pub(crate) fn with_status(mut m: Migration, status: MigrationStatus, seq: i64) -> Migration {
    m.status = status;
    m.sequence_number = seq;
    if status.is_terminal() {
        m.completed_at = Some(at(seq));
    }
    m
}

/// Same as [`make_migration`] under a given context.
pub(crate) fn in_context(mut m: Migration, context: &str) -> Migration {
    m.migration_context = MigrationContext::parse(context).unwrap();
    m
}

/// A shard scheduler over an in-memory store and engine, tuned for fast
/// polling.
pub(crate) struct Harness {
    pub(crate) sched: crate::ShardScheduler,
    pub(crate) engine: std::sync::Arc<shunt_db::MemoryEngine>,
}

pub(crate) fn fast_config() -> shunt_core::Config {
    let mut config = shunt_core::Config::default();
    config.scheduler.worker_poll_interval = std::time::Duration::from_millis(5);
    config.scheduler.tick_interval = std::time::Duration::from_millis(10);
    config
}

pub(crate) fn harness() -> Harness {
    use std::sync::Arc;
    let engine = Arc::new(shunt_db::MemoryEngine::new());
    engine
        .seed("CREATE TABLE t1 (id int NOT NULL, name varchar(64), PRIMARY KEY (id))")
        .unwrap();
    engine.seed("CREATE TABLE t2 (id int NOT NULL, PRIMARY KEY (id))").unwrap();
    let store = Arc::new(shunt_meta::DuckDbStore::open_memory().unwrap());
    let sched = crate::ShardScheduler::new(
        Keyspace::parse("commerce").unwrap(),
        Shard::parse("0").unwrap(),
        store,
        engine.clone(),
        Arc::new(shunt_sql::StatementAnalyzer::mysql()),
        Arc::new(fast_config()),
    );
    Harness { sched, engine }
}
