use super::*;
use crate::strategy::DdlStrategySetting;

fn sample(strategy: &str) -> Migration {
    let setting = DdlStrategySetting::parse(strategy).unwrap();
    Migration::new(
        MigrationUuid::generate(),
        Keyspace::parse("commerce").unwrap(),
        Shard::parse("0").unwrap(),
        TableName::new("t1"),
        ObjectKind::Table,
        "ALTER TABLE t1 ADD COLUMN c INT",
        setting.strategy,
        setting.options,
        MigrationContext::parse("ctx").unwrap(),
        Utc::now(),
    )
}

#[test]
fn test_new_record_is_queued_and_consistent() {
    let m = sample("online");
    assert_eq!(m.status, MigrationStatus::Queued);
    assert!(m.artifacts.is_empty());
    assert!(m.is_consistent());
}

#[test]
fn test_consistency_detects_missing_completed_at() {
    let mut m = sample("online");
    m.status = MigrationStatus::Complete;
    assert!(!m.is_consistent());
    m.completed_at = Some(Utc::now());
    assert!(m.is_consistent());
    m.status = MigrationStatus::Running;
    assert!(!m.is_consistent());
}

#[test]
fn test_strategy_string_round_trips() {
    let m = sample("vitess --allow-concurrent --postpone-completion");
    assert_eq!(
        m.strategy_string(),
        "online --allow-concurrent --postpone-completion"
    );
    assert!(m.is_concurrent());
}

#[test]
fn test_in_order_batch() {
    assert!(sample("online").in_order_batch().is_none());
    let m = sample("online --in-order-completion");
    assert_eq!(m.in_order_batch().unwrap().as_str(), "ctx");
}

#[test]
fn test_plan_action_and_object_kind_text() {
    for action in PlanAction::ALL {
        assert_eq!(action.as_str().parse::<PlanAction>().unwrap(), action);
    }
    assert_eq!("VIEW".parse::<ObjectKind>().unwrap(), ObjectKind::View);
    assert!("index".parse::<ObjectKind>().is_err());
    assert_eq!(ObjectKind::Table.keyword(), "TABLE");
}
