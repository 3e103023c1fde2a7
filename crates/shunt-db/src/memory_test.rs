use super::*;
use crate::throttle::ManualThrottle;
use shunt_core::Strategy;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const T1: &str = "CREATE TABLE t1 (id bigint NOT NULL, name varchar(64), PRIMARY KEY (id))";
const WAIT: Duration = Duration::from_secs(5);

fn gate(allowed: bool, force: bool) -> CutOverGate {
    CutOverGate {
        allowed,
        force,
        threshold: Duration::from_secs(10),
    }
}

struct Harness {
    control: Option<ExecutionControl>,
    gate: watch::Sender<CutOverGate>,
    cancel: CancellationToken,
    tx: EventSender,
    rx: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Harness {
    fn new(allowed: bool) -> Self {
        let (gate_tx, gate_rx) = watch::channel(gate(allowed, false));
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            control: Some(ExecutionControl {
                cancel: cancel.clone(),
                gate: gate_rx,
            }),
            gate: gate_tx,
            cancel,
            tx,
            rx,
        }
    }

    fn take(&mut self) -> (ExecutionControl, EventSender) {
        (self.control.take().unwrap(), self.tx.clone())
    }

    fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_for(&mut self, wanted: &EngineEvent) {
        timeout(WAIT, async {
            loop {
                let event = self.rx.recv().await.unwrap();
                if &event == wanted {
                    return;
                }
            }
        })
        .await
        .unwrap();
    }
}

fn request(strategy: Strategy, plan: ExecutionPlan) -> ExecutionRequest {
    ExecutionRequest {
        uuid: MigrationUuid::generate(),
        strategy,
        plan,
        prefer_instant_ddl: false,
    }
}

fn alter(sql: &str) -> ExecutionPlan {
    ExecutionPlan::Alter {
        name: "t1".to_string(),
        sql: sql.to_string(),
    }
}

async fn run(engine: &MemoryEngine, req: ExecutionRequest) -> DbResult<ExecutionOutcome> {
    let mut harness = Harness::new(true);
    let (control, tx) = harness.take();
    engine.execute(req, control, tx).await
}

fn seeded() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.seed(T1).unwrap();
    engine
}

#[tokio::test]
async fn test_online_alter_keeps_pre_image() {
    let engine = seeded();
    let mut harness = Harness::new(true);
    let (control, tx) = harness.take();
    let outcome = engine
        .execute(
            request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")),
            control,
            tx,
        )
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 1);
    let held = ArtifactName::parse(&outcome.artifacts[0]).unwrap();
    assert_eq!(held.kind, ArtifactKind::Held);

    let live = engine.show_create("t1").await.unwrap().unwrap();
    assert!(live.sql.contains("c int"));
    let pre_image = engine.show_create(&outcome.artifacts[0]).await.unwrap().unwrap();
    assert!(!pre_image.sql.contains("c int"));
    // shadow was consumed by the cut-over
    assert_eq!(engine.object_names().len(), 2);

    let events = harness.drain();
    assert!(matches!(&events[0], EngineEvent::ArtifactCreated(name) if name.starts_with("_shunt_vrp_")));
    assert!(events.contains(&EngineEvent::ReadyToComplete));
    assert!(events.contains(&EngineEvent::Progress { percent: 100.0 }));
}

#[tokio::test]
async fn test_direct_alter_is_in_place() {
    let engine = seeded();
    let outcome = run(
        &engine,
        request(Strategy::Direct, alter("ALTER TABLE t1 DROP COLUMN name")),
    )
    .await
    .unwrap();
    assert!(outcome.artifacts.is_empty());
    assert_eq!(engine.object_names(), vec!["t1"]);
    assert!(!engine.show_create("t1").await.unwrap().unwrap().sql.contains("name"));
}

#[tokio::test]
async fn test_instant_alter_leaves_no_artifacts() {
    let engine = seeded();
    let mut req = request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int"));
    req.prefer_instant_ddl = true;
    let outcome = run(&engine, req).await.unwrap();
    assert!(outcome.artifacts.is_empty());
    assert!(engine.show_create("t1").await.unwrap().unwrap().sql.contains("c int"));
}

#[tokio::test]
async fn test_swap_restores_exact_definition() {
    let engine = seeded();
    let original = engine.show_create("t1").await.unwrap().unwrap();

    let altered = run(
        &engine,
        request(Strategy::Online, alter("ALTER TABLE t1 MODIFY name varchar(255) NOT NULL")),
    )
    .await
    .unwrap();
    let swap = |artifact: &str| ExecutionPlan::Swap {
        object: ObjectKind::Table,
        name: "t1".to_string(),
        artifact: artifact.to_string(),
    };

    let reverted = run(&engine, request(Strategy::Online, swap(&altered.artifacts[0])))
        .await
        .unwrap();
    assert_eq!(engine.show_create("t1").await.unwrap().unwrap(), original);

    run(&engine, request(Strategy::Online, swap(&reverted.artifacts[0])))
        .await
        .unwrap();
    let again = engine.show_create("t1").await.unwrap().unwrap();
    assert!(again.sql.contains("varchar(255) NOT NULL"));
}

#[tokio::test]
async fn test_drop_and_restore() {
    let engine = seeded();
    let original = engine.show_create("t1").await.unwrap().unwrap();
    let dropped = run(
        &engine,
        request(
            Strategy::Online,
            ExecutionPlan::Drop {
                object: ObjectKind::Table,
                name: "t1".to_string(),
            },
        ),
    )
    .await
    .unwrap();
    assert!(!engine.contains("t1"));
    assert!(engine.contains(&dropped.artifacts[0]));

    let restored = run(
        &engine,
        request(
            Strategy::Online,
            ExecutionPlan::Restore {
                object: ObjectKind::Table,
                name: "t1".to_string(),
                artifact: dropped.artifacts[0].clone(),
            },
        ),
    )
    .await
    .unwrap();
    assert!(restored.artifacts.is_empty());
    assert_eq!(engine.show_create("t1").await.unwrap().unwrap(), original);
}

#[tokio::test]
async fn test_direct_drop_removes_object() {
    let engine = seeded();
    let outcome = run(
        &engine,
        request(
            Strategy::Mysql,
            ExecutionPlan::Drop {
                object: ObjectKind::Table,
                name: "t1".to_string(),
            },
        ),
    )
    .await
    .unwrap();
    assert!(outcome.artifacts.is_empty());
    assert!(engine.object_names().is_empty());
}

#[tokio::test]
async fn test_drop_wrong_kind_is_rejected() {
    let engine = seeded();
    let err = run(
        &engine,
        request(
            Strategy::Online,
            ExecutionPlan::Drop {
                object: ObjectKind::View,
                name: "t1".to_string(),
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::InvalidPlan(_)));
}

#[tokio::test]
async fn test_create_existing_fails() {
    let engine = seeded();
    let err = run(
        &engine,
        request(
            Strategy::Online,
            ExecutionPlan::Create {
                object: ObjectKind::Table,
                name: "t1".to_string(),
                sql: T1.to_string(),
            },
        ),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::ObjectExists(_)));
}

#[tokio::test]
async fn test_replace_view_holds_old_definition() {
    let engine = seeded();
    engine.seed("CREATE VIEW v1 AS SELECT id FROM t1").unwrap();
    let outcome = run(
        &engine,
        request(
            Strategy::Online,
            ExecutionPlan::Replace {
                object: ObjectKind::View,
                name: "v1".to_string(),
                sql: "CREATE VIEW v1 AS SELECT id, name FROM t1".to_string(),
            },
        ),
    )
    .await
    .unwrap();
    let live = engine.show_create("v1").await.unwrap().unwrap();
    assert_eq!(live.object, ObjectKind::View);
    assert!(live.sql.contains("id, name"));
    let held = engine.show_create(&outcome.artifacts[0]).await.unwrap().unwrap();
    assert!(held.sql.ends_with("AS SELECT id FROM t1"));
}

#[tokio::test]
async fn test_cut_over_waits_for_gate() {
    let engine = Arc::new(seeded());
    let mut harness = Harness::new(false);
    let (control, tx) = harness.take();
    let task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(
                    request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")),
                    control,
                    tx,
                )
                .await
        })
    };

    harness.wait_for(&EngineEvent::ReadyToComplete).await;
    assert!(!engine.show_create("t1").await.unwrap().unwrap().sql.contains("c int"));

    harness.gate.send(gate(true, false)).unwrap();
    let outcome = timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome.artifacts.len(), 1);
    assert!(engine.show_create("t1").await.unwrap().unwrap().sql.contains("c int"));
}

#[tokio::test]
async fn test_cancel_releases_shadow() {
    let engine = Arc::new(seeded());
    let mut harness = Harness::new(false);
    let (control, tx) = harness.take();
    let task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(
                    request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")),
                    control,
                    tx,
                )
                .await
        })
    };

    harness.wait_for(&EngineEvent::ReadyToComplete).await;
    assert_eq!(engine.object_names().len(), 2);
    harness.cancel.cancel();

    let err = timeout(WAIT, task).await.unwrap().unwrap().unwrap_err();
    assert!(matches!(err, DbError::Cancelled));
    assert_eq!(engine.object_names(), vec!["t1"]);
}

#[tokio::test]
async fn test_locked_cut_over_times_out_until_forced() {
    let engine = Arc::new(seeded());
    engine.lock_object("t1", 3);
    let mut harness = Harness::new(true);
    let (control, tx) = harness.take();
    let task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(
                    request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")),
                    control,
                    tx,
                )
                .await
        })
    };

    harness
        .wait_for(&EngineEvent::CutOverTimedOut { attempt: 1 })
        .await;
    assert!(!task.is_finished());

    harness.gate.send(gate(true, true)).unwrap();
    harness
        .wait_for(&EngineEvent::SessionsTerminated { count: 3 })
        .await;
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert!(engine.show_create("t1").await.unwrap().unwrap().sql.contains("c int"));
}

#[tokio::test]
async fn test_throttle_holds_copy() {
    let throttle = Arc::new(ManualThrottle::new());
    throttle.throttle(1.0, "replica lag");
    let engine = Arc::new(MemoryEngine::new().with_throttle(throttle.clone()));
    engine.seed(T1).unwrap();
    let mut harness = Harness::new(true);
    let (control, tx) = harness.take();
    let task = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(
                    request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")),
                    control,
                    tx,
                )
                .await
        })
    };

    harness
        .wait_for(&EngineEvent::Throttled {
            ratio: 1.0,
            reason: "replica lag".to_string(),
        })
        .await;
    throttle.unthrottle();
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();
    assert!(harness.drain().contains(&EngineEvent::Throttled {
        ratio: 0.0,
        reason: String::new(),
    }));
}

#[tokio::test]
async fn test_transient_fault_then_success() {
    let engine = seeded();
    engine.inject_fault("t1", Fault::transient(1));
    let req = request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int"));
    let err = run(&engine, req.clone()).await.unwrap_err();
    assert!(err.is_transient());
    run(&engine, req).await.unwrap();
}

#[tokio::test]
async fn test_permanent_fault() {
    let engine = seeded();
    engine.inject_fault("t1", Fault::permanent("disk full"));
    let err = run(&engine, request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")))
        .await
        .unwrap_err();
    assert!(!err.is_transient());
    assert!(err.to_string().contains("disk full"));
    engine.clear_fault("t1");
    run(&engine, request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_drop_artifact() {
    let engine = seeded();
    let outcome = run(
        &engine,
        request(Strategy::Online, alter("ALTER TABLE t1 ADD COLUMN c int")),
    )
    .await
    .unwrap();
    let artifact = &outcome.artifacts[0];

    engine.inject_fault(artifact, Fault::transient(1));
    assert!(engine.drop_artifact(artifact).await.is_err());
    engine.drop_artifact(artifact).await.unwrap();
    assert!(!engine.contains(artifact));
    // already gone
    engine.drop_artifact(artifact).await.unwrap();

    assert!(matches!(
        engine.drop_artifact("t1").await,
        Err(DbError::InvalidPlan(_))
    ));
}

#[tokio::test]
async fn test_noop() {
    let engine = seeded();
    let outcome = run(
        &engine,
        request(
            Strategy::Online,
            ExecutionPlan::Noop {
                reason: "identical".to_string(),
            },
        ),
    )
    .await
    .unwrap();
    assert_eq!(outcome, ExecutionOutcome::default());
}
