use super::*;
use crate::test_utils::{at, make_migration, with_status};
use shunt_core::MigrationStatus;
use std::time::Duration;

fn running(strategy: &str) -> Migration {
    let mut m = with_status(make_migration("t1", strategy), MigrationStatus::Running, 1);
    m.started_at = Some(at(0));
    m
}

#[test]
fn test_gate_defaults() {
    let config = Config::default();
    let gate = gate_for(&running("online"), &InOrderVerdict::Proceed, &config, at(1));
    assert!(gate.allowed);
    assert!(!gate.force);
    assert_eq!(gate.threshold, config.cutover.default_threshold);
}

#[test]
fn test_gate_closed_while_postponed_or_waiting() {
    let config = Config::default();
    let postponed = running("online --postpone-completion");
    assert!(!gate_for(&postponed, &InOrderVerdict::Proceed, &config, at(1)).allowed);

    let m = running("online --in-order-completion");
    let verdict = InOrderVerdict::Wait(MigrationUuid::generate());
    assert!(!gate_for(&m, &verdict, &config, at(1)).allowed);
}

#[test]
fn test_gate_force() {
    let config = Config::default();
    let mut m = running("online --force-cut-over-after=30s --cutover-threshold=7s");
    let early = gate_for(&m, &InOrderVerdict::Proceed, &config, at(29));
    assert!(!early.force);
    assert_eq!(early.threshold, Duration::from_secs(7));
    assert!(gate_for(&m, &InOrderVerdict::Proceed, &config, at(30)).force);

    m.options.force_cut_over_after = None;
    m.force_cutover = true;
    assert!(gate_for(&m, &InOrderVerdict::Proceed, &config, at(1)).force);
}
