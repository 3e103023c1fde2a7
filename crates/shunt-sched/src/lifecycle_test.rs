use super::*;
use crate::test_utils::{at, make_migration, with_status};

fn check(command: OperatorCommand, m: &Migration) -> SchedResult<CommandOutcome> {
    validate(command, m, &CutOverConfig::default()).map(|(outcome, _)| outcome)
}

#[test]
fn test_transition_table() {
    assert!(Transition::Review.allowed(Queued));
    assert!(!Transition::Review.allowed(Ready));
    assert!(Transition::Start.allowed(Ready));
    assert!(!Transition::Start.allowed(Queued));
    assert!(Transition::Complete.allowed(Running));
    for status in MigrationStatus::ACTIVE {
        assert!(Transition::Cancel.allowed(status));
        assert!(Transition::Fail.allowed(status));
    }
    for status in MigrationStatus::TERMINAL {
        assert!(!Transition::Cancel.allowed(status));
        assert!(status.is_terminal());
    }
    assert!(Transition::Requeue.allowed(Failed));
    assert!(Transition::Requeue.allowed(Cancelled));
    assert!(!Transition::Requeue.allowed(Complete));
    assert_eq!(Transition::Requeue.to(), Queued);
}

#[test]
fn test_launch() {
    let postponed = make_migration("t1", "online --postpone-launch");
    assert_eq!(
        check(OperatorCommand::Launch, &postponed).unwrap(),
        CommandOutcome::Applied
    );

    let plain = make_migration("t1", "online");
    assert_eq!(
        check(OperatorCommand::Launch, &plain).unwrap(),
        CommandOutcome::NoOp
    );

    let running = with_status(postponed, Running, 1);
    assert_eq!(
        check(OperatorCommand::Launch, &running).unwrap(),
        CommandOutcome::NoOp
    );
}

#[test]
fn test_complete_clears_postponement_only() {
    let postponed = with_status(make_migration("t1", "online --postpone-completion"), Running, 1);
    assert_eq!(
        check(OperatorCommand::Complete, &postponed).unwrap(),
        CommandOutcome::Applied
    );
    let plain = with_status(make_migration("t1", "online"), Running, 1);
    assert_eq!(
        check(OperatorCommand::Complete, &plain).unwrap(),
        CommandOutcome::NoOp
    );
}

#[test]
fn test_cancel_terminal_is_noop() {
    let queued = make_migration("t1", "online");
    assert_eq!(
        check(OperatorCommand::Cancel, &queued).unwrap(),
        CommandOutcome::Applied
    );
    let done = with_status(make_migration("t1", "online"), Complete, 1);
    assert_eq!(
        check(OperatorCommand::Cancel, &done).unwrap(),
        CommandOutcome::NoOp
    );
}

#[test]
fn test_force_cut_over_requires_running() {
    let queued = make_migration("t1", "online");
    let err = check(OperatorCommand::ForceCutOver, &queued).unwrap_err();
    assert!(err.is_command());
    assert!(err.to_string().contains("not running"));

    let mut running = with_status(make_migration("t1", "online"), Running, 1);
    assert_eq!(
        check(OperatorCommand::ForceCutOver, &running).unwrap(),
        CommandOutcome::Applied
    );
    running.force_cutover = true;
    assert_eq!(
        check(OperatorCommand::ForceCutOver, &running).unwrap(),
        CommandOutcome::NoOp
    );
}

#[test]
fn test_set_cutover_threshold_range() {
    let running = with_status(make_migration("t1", "online"), Running, 1);
    let cutover = CutOverConfig::default();

    let (_, stored) = validate(
        OperatorCommand::SetCutOverThreshold(Duration::from_millis(12_700)),
        &running,
        &cutover,
    )
    .unwrap();
    assert_eq!(stored, Some(Duration::from_secs(12)));

    let too_low = validate(
        OperatorCommand::SetCutOverThreshold(Duration::from_secs(1)),
        &running,
        &cutover,
    )
    .unwrap_err();
    assert!(matches!(too_low, SchedError::OutOfRange(_)));
    assert!(too_low.to_string().contains("min"));

    let too_high = validate(
        OperatorCommand::SetCutOverThreshold(Duration::from_secs(300)),
        &running,
        &cutover,
    )
    .unwrap_err();
    assert!(too_high.to_string().contains("max"));
}

#[test]
fn test_set_cutover_threshold_rejects_terminal_and_mysql() {
    let done = with_status(make_migration("t1", "online"), Complete, 1);
    assert!(check(OperatorCommand::SetCutOverThreshold(Duration::from_secs(10)), &done).is_err());

    let mysql = with_status(make_migration("t1", "mysql"), Running, 1);
    assert!(check(OperatorCommand::SetCutOverThreshold(Duration::from_secs(10)), &mysql).is_err());
}

#[test]
fn test_cleanup_requires_completion() {
    let running = with_status(make_migration("t1", "online"), Running, 1);
    assert!(check(OperatorCommand::Cleanup, &running).is_err());

    let mut done = with_status(make_migration("t1", "online"), Complete, 1);
    assert_eq!(
        check(OperatorCommand::Cleanup, &done).unwrap(),
        CommandOutcome::Applied
    );
    done.cleanup_at = Some(at(5));
    assert_eq!(
        check(OperatorCommand::Cleanup, &done).unwrap(),
        CommandOutcome::NoOp
    );
}

#[test]
fn test_retry() {
    let failed = with_status(make_migration("t1", "online"), Failed, 1);
    assert_eq!(
        check(OperatorCommand::Retry, &failed).unwrap(),
        CommandOutcome::Applied
    );
    let running = with_status(make_migration("t1", "online"), Running, 1);
    assert_eq!(
        check(OperatorCommand::Retry, &running).unwrap(),
        CommandOutcome::NoOp
    );
    let done = with_status(make_migration("t1", "online"), Complete, 1);
    assert!(check(OperatorCommand::Retry, &done).is_err());

    let mut reaped = with_status(make_migration("t1", "online"), Failed, 1);
    reaped.cleanup_at = Some(at(5));
    let err = check(OperatorCommand::Retry, &reaped).unwrap_err();
    assert!(matches!(err, SchedError::InvalidTransition { .. }));
    assert!(err.to_string().contains("cleaned up"));
}

#[test]
fn test_postpone() {
    let running = with_status(make_migration("t1", "online"), Running, 1);
    assert_eq!(
        check(OperatorCommand::Postpone, &running).unwrap(),
        CommandOutcome::Applied
    );
    let direct = make_migration("t1", "direct");
    assert!(check(OperatorCommand::Postpone, &direct).is_err());
}
