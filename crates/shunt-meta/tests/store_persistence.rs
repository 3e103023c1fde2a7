//! File-backed store behaviour across reopen.

use chrono::{TimeZone, Utc};
use shunt_core::{
    DdlStrategySetting, Keyspace, Migration, MigrationContext, MigrationStatus, MigrationUuid,
    ObjectKind, Shard, TableName,
};
use shunt_meta::{DuckDbStore, MigrationFilter, MigrationStore};

fn create_migration(sequence: i64) -> Migration {
    let setting = DdlStrategySetting::parse("online --singleton-table").unwrap();
    let mut m = Migration::new(
        MigrationUuid::generate(),
        Keyspace::parse("commerce").unwrap(),
        Shard::parse("0").unwrap(),
        TableName::new("t1"),
        ObjectKind::Table,
        "CREATE TABLE t1 (id int)",
        setting.strategy,
        setting.options,
        MigrationContext::parse("persist").unwrap(),
        Utc.timestamp_opt(1_790_000_000, 0).unwrap(),
    );
    m.sequence_number = sequence;
    m
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commerce-0.duckdb");

    let (uuid, first_sequence) = {
        let store = DuckDbStore::open(&path).unwrap();
        let sequence = store.next_sequence().await.unwrap();
        let m = create_migration(sequence);
        store.insert(&m).await.unwrap();
        store
            .mark_failed(&m.uuid, "lock wait timeout", Utc::now())
            .await
            .unwrap();
        (m.uuid, sequence)
    };

    let store = DuckDbStore::open(&path).unwrap();
    let loaded = store.get(&uuid).await.unwrap().unwrap();
    assert_eq!(loaded.status, MigrationStatus::Failed);
    assert_eq!(loaded.message, "lock wait timeout");
    assert!(loaded.options.singleton_table);
    assert!(loaded.is_consistent());

    // sequence numbers are never reused
    assert!(store.next_sequence().await.unwrap() > first_sequence);
    assert_eq!(
        store.query(&MigrationFilter::pattern("persist")).await.unwrap().len(),
        1
    );
}
