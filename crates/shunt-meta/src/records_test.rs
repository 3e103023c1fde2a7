use super::*;
use chrono::TimeZone;
use shunt_core::{DdlStrategySetting, Keyspace, MigrationContext, MigrationStatus, Shard, TableName};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_790_000_000 + secs, 0).unwrap()
}

fn migration(store_seq: i64, table: &str, strategy: &str, context: &str) -> Migration {
    let setting = DdlStrategySetting::parse(strategy).unwrap();
    let mut m = Migration::new(
        MigrationUuid::generate(),
        Keyspace::parse("commerce").unwrap(),
        Shard::parse("0").unwrap(),
        TableName::new(table),
        ObjectKind::Table,
        format!("ALTER TABLE {} ADD COLUMN c int", table),
        setting.strategy,
        setting.options,
        MigrationContext::parse(context).unwrap(),
        at(0),
    );
    m.sequence_number = store_seq;
    m
}

async fn stored(store: &DuckDbStore, table: &str, strategy: &str) -> Migration {
    let mut m = migration(0, table, strategy, "ctx");
    m.sequence_number = store.next_sequence().await.unwrap();
    store.insert(&m).await.unwrap();
    m
}

async fn reload(store: &DuckDbStore, m: &Migration) -> Migration {
    store.get(&m.uuid).await.unwrap().unwrap()
}

#[tokio::test]
async fn insert_and_get_round_trip() {
    let store = DuckDbStore::open_memory().unwrap();
    let mut m = migration(
        1,
        "t1",
        "online --allow-concurrent --postpone-completion --cutover-threshold=12s --retain-artifacts=1h",
        "ctx",
    );
    m.artifacts = vec!["_shunt_hld_a".to_string(), "_shunt_vrp_b".to_string()];
    m.reverted_uuid = Some(MigrationUuid::generate());
    m.is_revert = true;
    store.insert(&m).await.unwrap();

    let loaded = reload(&store, &m).await;
    assert_eq!(loaded, m);
    assert_eq!(
        loaded.options.cutover_threshold,
        Some(Duration::from_secs(12))
    );
}

#[tokio::test]
async fn duplicate_uuid_is_rejected() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = migration(1, "t1", "online", "ctx");
    store.insert(&m).await.unwrap();
    let err = store.insert(&m).await.unwrap_err();
    assert!(matches!(err, MetaError::DuplicateMigration(_)));
}

#[tokio::test]
async fn insert_batch_is_atomic() {
    let store = DuckDbStore::open_memory().unwrap();
    let existing = migration(1, "t1", "online", "ctx");
    store.insert(&existing).await.unwrap();

    let fresh = migration(2, "t2", "online", "ctx");
    let result = store.insert_batch(&[fresh.clone(), existing.clone()]).await;
    assert!(result.is_err());
    assert!(store.get(&fresh.uuid).await.unwrap().is_none());
}

#[tokio::test]
async fn sequence_numbers_increase() {
    let store = DuckDbStore::open_memory().unwrap();
    let a = store.next_sequence().await.unwrap();
    let b = store.next_sequence().await.unwrap();
    assert!(b > a);
}

#[tokio::test]
async fn lifecycle_transitions_are_conditional() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = stored(&store, "t1", "online").await;

    // running requires ready first
    assert!(!store.mark_running(&m.uuid, at(1)).await.unwrap());
    assert!(store.mark_ready(&m.uuid, at(1)).await.unwrap());
    assert!(!store.mark_ready(&m.uuid, at(2)).await.unwrap());
    assert!(store.mark_running(&m.uuid, at(2)).await.unwrap());

    let artifacts = vec!["_shunt_hld_x".to_string()];
    assert!(store.mark_complete(&m.uuid, &artifacts, at(3)).await.unwrap());
    assert!(!store.mark_failed(&m.uuid, "late", at(4)).await.unwrap());

    let loaded = reload(&store, &m).await;
    assert_eq!(loaded.status, MigrationStatus::Complete);
    assert_eq!(loaded.ready_at, Some(at(1)));
    assert_eq!(loaded.started_at, Some(at(2)));
    assert_eq!(loaded.completed_at, Some(at(3)));
    assert_eq!(loaded.artifacts, artifacts);
    assert_eq!(loaded.progress, 100.0);
    assert!(loaded.is_consistent());
}

#[tokio::test]
async fn postponed_launch_waits_for_launch() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = stored(&store, "t1", "online --postpone-launch").await;

    assert!(!store.mark_ready(&m.uuid, at(1)).await.unwrap());
    assert!(store.launch(&m.uuid, at(2)).await.unwrap());
    assert!(!store.launch(&m.uuid, at(3)).await.unwrap());

    let loaded = reload(&store, &m).await;
    assert_eq!(loaded.status, MigrationStatus::Ready);
    assert!(!loaded.options.postpone_launch);
}

#[tokio::test]
async fn cancel_and_requeue() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = stored(&store, "t1", "online").await;

    assert!(store.request_cancel(&m.uuid).await.unwrap());
    assert!(!store.request_cancel(&m.uuid).await.unwrap());
    assert!(store.mark_cancelled(&m.uuid, "cancelled by operator", at(1)).await.unwrap());
    assert!(!store.request_cancel(&m.uuid).await.unwrap());

    let cancelled = reload(&store, &m).await;
    assert_eq!(cancelled.status, MigrationStatus::Cancelled);
    assert_eq!(cancelled.completed_at, Some(at(1)));

    assert!(store.requeue(&m.uuid, at(2)).await.unwrap());
    assert!(!store.requeue(&m.uuid, at(3)).await.unwrap());
    let requeued = reload(&store, &m).await;
    assert_eq!(requeued.status, MigrationStatus::Queued);
    assert_eq!(requeued.retries, 1);
    assert!(requeued.completed_at.is_none());
    assert!(!requeued.cancel_requested);
    assert!(requeued.message.is_empty());
}

#[tokio::test]
async fn running_updates() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = stored(&store, "t1", "online --postpone-completion").await;

    // progress is only recorded while running
    assert!(!store.set_progress(&m.uuid, 10.0).await.unwrap());
    store.mark_ready(&m.uuid, at(1)).await.unwrap();
    store.mark_running(&m.uuid, at(2)).await.unwrap();

    assert!(store.set_progress(&m.uuid, 42.5).await.unwrap());
    assert!(store.set_ready_to_complete(&m.uuid, true).await.unwrap());
    assert!(store.set_throttle(&m.uuid, 0.75, "lag").await.unwrap());
    assert!(store.set_plan(&m.uuid, PlanAction::Alter, ObjectKind::Table).await.unwrap());
    assert!(store.add_artifact(&m.uuid, "_shunt_vrp_a").await.unwrap());
    assert!(store.add_artifact(&m.uuid, "_shunt_hld_b").await.unwrap());
    assert!(store.increment_retries(&m.uuid).await.unwrap());
    assert!(store.set_postpone_completion(&m.uuid, false).await.unwrap());
    assert!(!store.set_postpone_completion(&m.uuid, false).await.unwrap());
    assert!(store.request_force_cutover(&m.uuid).await.unwrap());
    assert!(!store.request_force_cutover(&m.uuid).await.unwrap());
    assert!(store
        .set_cutover_threshold(&m.uuid, Duration::from_secs(20))
        .await
        .unwrap());

    let loaded = reload(&store, &m).await;
    assert_eq!(loaded.progress, 42.5);
    assert!(loaded.ready_to_complete);
    assert_eq!(loaded.user_throttle_ratio, 0.75);
    assert_eq!(loaded.message, "lag");
    assert_eq!(loaded.ddl_action, Some(PlanAction::Alter));
    assert_eq!(loaded.artifacts, vec!["_shunt_vrp_a", "_shunt_hld_b"]);
    assert_eq!(loaded.retries, 1);
    assert!(!loaded.options.postpone_completion);
    assert!(loaded.force_cutover);
    assert_eq!(loaded.options.cutover_threshold, Some(Duration::from_secs(20)));
}

#[tokio::test]
async fn force_cutover_requires_running() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = stored(&store, "t1", "online").await;
    assert!(!store.request_force_cutover(&m.uuid).await.unwrap());
}

#[tokio::test]
async fn query_filters() {
    let store = DuckDbStore::open_memory().unwrap();
    let first = stored(&store, "t1", "online").await;
    let mut second = migration(0, "t2", "online", "batch-7");
    second.sequence_number = store.next_sequence().await.unwrap();
    store.insert(&second).await.unwrap();
    store.mark_failed(&second.uuid, "boom", at(1)).await.unwrap();

    let all = store.query(&MigrationFilter::all()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].uuid, first.uuid);

    let by_uuid = store
        .query(&MigrationFilter::pattern(first.uuid.as_str()))
        .await
        .unwrap();
    assert_eq!(by_uuid.len(), 1);

    let by_context = store
        .query(&MigrationFilter::pattern("batch-*"))
        .await
        .unwrap();
    assert_eq!(by_context.len(), 1);
    assert_eq!(by_context[0].uuid, second.uuid);

    let failed = store
        .query(&MigrationFilter::all().with_statuses(&[MigrationStatus::Failed]))
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);

    let mut shard_filter = MigrationFilter::all();
    shard_filter.shard = Some("-80".to_string());
    assert!(store.query(&shard_filter).await.unwrap().is_empty());

    let active = store.active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].uuid, first.uuid);
}

#[tokio::test]
async fn cleanup_bookkeeping() {
    let store = DuckDbStore::open_memory().unwrap();
    let done = stored(&store, "t1", "online").await;
    let pending = stored(&store, "t2", "online").await;

    // cleanup needs completed_at
    assert!(!store.request_cleanup(&pending.uuid).await.unwrap());

    store.mark_ready(&done.uuid, at(1)).await.unwrap();
    store.mark_running(&done.uuid, at(1)).await.unwrap();
    let artifacts = vec!["_shunt_hld_a".to_string(), "_shunt_vrp_b".to_string()];
    store.mark_complete(&done.uuid, &artifacts, at(2)).await.unwrap();

    let candidates = store.cleanup_candidates().await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].uuid, done.uuid);

    assert_eq!(store.request_cleanup_all().await.unwrap(), 1);
    assert!(!store.request_cleanup(&done.uuid).await.unwrap());

    assert!(store
        .retain_artifacts(&done.uuid, &artifacts[1..])
        .await
        .unwrap());
    assert_eq!(reload(&store, &done).await.artifacts, vec!["_shunt_vrp_b"]);

    assert!(store.mark_cleaned_up(&done.uuid, at(3)).await.unwrap());
    assert!(!store.mark_cleaned_up(&done.uuid, at(4)).await.unwrap());
    let cleaned = reload(&store, &done).await;
    assert!(cleaned.artifacts.is_empty());
    assert_eq!(cleaned.cleanup_at, Some(at(3)));
    assert!(store.cleanup_candidates().await.unwrap().is_empty());
}

#[tokio::test]
async fn requeue_refuses_cleaned_up_record() {
    let store = DuckDbStore::open_memory().unwrap();
    let m = stored(&store, "t1", "online").await;
    store.mark_ready(&m.uuid, at(1)).await.unwrap();
    store.mark_running(&m.uuid, at(1)).await.unwrap();
    assert!(store.mark_failed(&m.uuid, "disk full", at(2)).await.unwrap());
    assert!(store.request_cleanup(&m.uuid).await.unwrap());
    assert!(store.mark_cleaned_up(&m.uuid, at(3)).await.unwrap());

    assert!(!store.requeue(&m.uuid, at(4)).await.unwrap());
    let failed = reload(&store, &m).await;
    assert_eq!(failed.status, MigrationStatus::Failed);
    assert_eq!(failed.cleanup_at, Some(at(3)));
    assert_eq!(failed.retries, 0);
}
