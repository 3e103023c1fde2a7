use super::*;

#[test]
fn test_terminal_and_active_partition_all_states() {
    for status in MigrationStatus::ALL {
        assert_ne!(status.is_terminal(), status.is_active(), "{status}");
    }
    assert!(MigrationStatus::Cancelled.is_terminal());
    assert!(MigrationStatus::Running.is_active());
}

#[test]
fn test_retryable_states() {
    assert!(MigrationStatus::Failed.is_retryable());
    assert!(MigrationStatus::Cancelled.is_retryable());
    assert!(!MigrationStatus::Complete.is_retryable());
    assert!(!MigrationStatus::Queued.is_retryable());
}

#[test]
fn test_round_trip_text() {
    for status in MigrationStatus::ALL {
        let parsed: MigrationStatus = status.as_str().parse().unwrap();
        assert_eq!(parsed, status);
    }
    assert_eq!(
        "RUNNING".parse::<MigrationStatus>().unwrap(),
        MigrationStatus::Running
    );
}

#[test]
fn test_unknown_status() {
    let err = "paused".parse::<MigrationStatus>().unwrap_err();
    assert!(err.to_string().contains("paused"));
}

#[test]
fn test_serde_lowercase() {
    let json = serde_json::to_string(&MigrationStatus::Complete).unwrap();
    assert_eq!(json, "\"complete\"");
}
