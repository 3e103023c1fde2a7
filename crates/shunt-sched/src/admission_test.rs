use super::*;
use crate::test_utils::{in_context, make_migration, with_status};
use shunt_core::MigrationStatus::{Cancelled, Complete, Failed, Queued, Ready, Running};

fn running(table: &str, strategy: &str) -> Migration {
    with_status(make_migration(table, strategy), Running, 1)
}

#[test]
fn test_same_table_conflicts() {
    let busy = running("t1", "online");
    let candidate = make_migration("T1", "online");
    assert!(!evaluate(&candidate, &[&busy]).is_admitted());

    let other = make_migration("t2", "online");
    assert_eq!(evaluate(&other, &[&busy]), Admission::Admit);
}

#[test]
fn test_allow_concurrent_keeps_table_exclusion() {
    let busy = running("t1", "online --allow-concurrent");
    let same = make_migration("t1", "online --allow-concurrent");
    let other = make_migration("t2", "online --allow-concurrent");
    assert!(!evaluate(&same, &[&busy]).is_admitted());
    assert!(evaluate(&other, &[&busy]).is_admitted());
}

#[test]
fn test_singleton_blocks_non_concurrent() {
    let singleton = running("t1", "online --singleton");
    let plain = make_migration("t2", "online");
    let concurrent = make_migration("t3", "online --allow-concurrent");
    assert!(!evaluate(&plain, &[&singleton]).is_admitted());
    assert!(evaluate(&concurrent, &[&singleton]).is_admitted());

    // and the other way around
    let busy = running("t2", "online");
    let candidate = make_migration("t1", "online --singleton");
    match evaluate(&candidate, &[&busy]) {
        Admission::Blocked(reason) => assert!(reason.contains(busy.uuid.as_str())),
        Admission::Admit => panic!("singleton admitted next to a running migration"),
    }
}

#[test]
fn test_candidate_ignores_itself() {
    let m = running("t1", "online");
    assert!(evaluate(&m, &[&m]).is_admitted());
}

#[test]
fn test_singleton_table_rejects_second_submission() {
    let first = with_status(make_migration("t1", "online --singleton-table"), Queued, 1);
    let second = make_migration("t1", "online --allow-concurrent");
    let err = check_submission(&second, std::slice::from_ref(&first), &[]).unwrap_err();
    assert!(err.contains("singleton-table"));

    // terminal migrations no longer reserve the table
    let done = with_status(first, Complete, 1);
    assert!(check_submission(&second, &[done], &[]).is_ok());
}

#[test]
fn test_singleton_table_candidate_sees_batch() {
    let earlier = make_migration("t1", "online");
    let candidate = make_migration("t1", "online --singleton-table");
    let err = check_submission(&candidate, &[], std::slice::from_ref(&earlier)).unwrap_err();
    assert!(err.contains("singleton-table"));
    assert!(check_submission(&make_migration("t2", "online --singleton-table"), &[], &[earlier]).is_ok());
}

#[test]
fn test_singleton_submission() {
    let live = with_status(make_migration("t9", "online"), Ready, 1);
    let candidate = make_migration("t1", "online --singleton");
    assert!(check_submission(&candidate, std::slice::from_ref(&live), &[])
        .unwrap_err()
        .contains("singleton"));
    assert!(check_submission(&candidate, &[], &[]).is_ok());
    // a failed migration does not count
    let failed = with_status(live, Failed, 1);
    assert!(check_submission(&candidate, &[failed], &[]).is_ok());
}

#[test]
fn test_singleton_context_submission() {
    let live = in_context(
        with_status(make_migration("t1", "online --singleton-context"), Running, 1),
        "ctx-a",
    );
    let candidate = in_context(make_migration("t2", "online --singleton-context"), "ctx-b");
    let err = check_submission(&candidate, std::slice::from_ref(&live), &[]).unwrap_err();
    assert!(err.contains("singleton-context"));
    assert!(err.contains("ctx-a"));

    // batch members submitted together do not conflict with each other
    let sibling = in_context(make_migration("t3", "online --singleton-context"), "ctx-b");
    assert!(check_submission(&candidate, &[], &[sibling]).is_ok());
}

#[test]
fn test_most_restrictive_scope_wins() {
    // singleton-table alone would allow a different table; singleton does not
    let live = with_status(make_migration("t9", "online"), Queued, 1);
    let candidate = make_migration("t1", "online --singleton --singleton-table");
    assert!(check_submission(&candidate, &[live], &[]).is_err());
}

fn batch(tables: &[&str]) -> Vec<Migration> {
    tables
        .iter()
        .enumerate()
        .map(|(i, t)| {
            with_status(
                make_migration(t, "online --in-order-completion --allow-concurrent"),
                Running,
                i as i64 + 1,
            )
        })
        .collect()
}

#[test]
fn test_in_order_waits_for_predecessor() {
    let members = batch(&["t1", "t2", "t3"]);
    assert_eq!(in_order_verdict(&members[0], &members), InOrderVerdict::Proceed);
    assert_eq!(
        in_order_verdict(&members[2], &members),
        InOrderVerdict::Wait(members[0].uuid.clone())
    );
}

#[test]
fn test_in_order_bails_out() {
    let mut members = batch(&["t1", "t2", "t3"]);
    members[0] = with_status(members[0].clone(), Complete, 1);
    members[1] = with_status(members[1].clone(), Cancelled, 2);

    let verdict = in_order_verdict(&members[2], &members);
    assert_eq!(
        verdict,
        InOrderVerdict::BailOut {
            predecessor: members[1].uuid.clone(),
            status: Cancelled,
        }
    );
    let message = verdict.bail_out_message().unwrap();
    assert!(message.contains(members[1].uuid.as_str()));
}

#[test]
fn test_in_order_ignores_other_contexts() {
    let mut members = batch(&["t1", "t2"]);
    members[0] = in_context(with_status(members[0].clone(), Failed, 1), "elsewhere");
    assert_eq!(in_order_verdict(&members[1], &members), InOrderVerdict::Proceed);

    let plain = with_status(make_migration("t3", "online"), Running, 9);
    assert_eq!(in_order_verdict(&plain, &members), InOrderVerdict::Proceed);
}
