use crate::ddl::SCHEMA_VERSIONS;
use crate::DuckDbStore;

#[test]
fn open_memory_applies_schema() {
    let store = DuckDbStore::open_memory().unwrap();
    assert_eq!(
        store
            .count("SELECT COUNT(*) FROM shunt_meta.schema_version")
            .unwrap(),
        SCHEMA_VERSIONS.len() as i64
    );
    assert_eq!(
        store.count("SELECT COUNT(*) FROM shunt_meta.migrations").unwrap(),
        0
    );
}

#[test]
fn open_file_creates_database_and_parent_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("commerce-0.duckdb");
    assert!(!path.exists());
    let _store = DuckDbStore::open(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn reopen_does_not_reapply_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.duckdb");
    {
        let _first = DuckDbStore::open(&path).unwrap();
    }
    let second = DuckDbStore::open(&path).unwrap();
    assert_eq!(
        second
            .count("SELECT COUNT(*) FROM shunt_meta.schema_version")
            .unwrap(),
        SCHEMA_VERSIONS.len() as i64
    );
}

#[test]
fn transaction_rolls_back_on_error() {
    let store = DuckDbStore::open_memory().unwrap();
    let result: crate::MetaResult<()> = store.transaction(|conn| {
        conn.execute_batch("CREATE TABLE scratch (id INTEGER)")?;
        Err(crate::MetaError::QueryError("boom".to_string()))
    });
    assert!(result.is_err());
    assert!(store.count("SELECT COUNT(*) FROM scratch").is_err());
}

#[test]
fn status_check_rejects_unknown_status() {
    let store = DuckDbStore::open_memory().unwrap();
    let inserted = store.update(
        "bad status",
        "INSERT INTO shunt_meta.migrations (uuid, keyspace, shard, table_name, statement,
             strategy, migration_context, status, sequence_number, requested_at, updated_at)
         VALUES ('x', 'ks', '0', 't1', 'CREATE TABLE t1 (id int)', 'online', 'c', 'paused', 1,
             TIMESTAMP '2026-01-01 00:00:00', TIMESTAMP '2026-01-01 00:00:00')",
        &[],
    );
    assert!(inserted.is_err());
}
