//! Shared harness for scheduler scenario tests.
#![allow(dead_code)]

use shunt_core::{Config, Keyspace, Migration, MigrationStatus, MigrationUuid, Shard};
use shunt_db::MemoryEngine;
use shunt_meta::DuckDbStore;
use shunt_sched::{ShardScheduler, SubmitRequest};
use shunt_sql::StatementAnalyzer;
use std::sync::Arc;
use std::time::Duration;

pub const T1: &str = "CREATE TABLE t1 (id int NOT NULL, name varchar(64), PRIMARY KEY (id))";
pub const T2: &str = "CREATE TABLE t2 (id int NOT NULL, PRIMARY KEY (id))";
pub const T3: &str = "CREATE TABLE t3 (id int NOT NULL, PRIMARY KEY (id))";

const WAIT: Duration = Duration::from_secs(10);

pub struct Harness {
    pub sched: ShardScheduler,
    pub engine: Arc<MemoryEngine>,
    pub store: Arc<DuckDbStore>,
}

pub fn config() -> Config {
    let mut config = Config::default();
    config.scheduler.worker_poll_interval = Duration::from_millis(5);
    config.scheduler.tick_interval = Duration::from_millis(10);
    config
}

pub fn scheduler(shard: &str, store: Arc<DuckDbStore>, engine: Arc<MemoryEngine>) -> ShardScheduler {
    ShardScheduler::new(
        Keyspace::parse("commerce").unwrap(),
        Shard::parse(shard).unwrap(),
        store,
        engine,
        Arc::new(StatementAnalyzer::mysql()),
        Arc::new(config()),
    )
}

/// Scheduler with tables t1, t2 and t3 on the engine.
pub fn harness() -> Harness {
    let engine = Arc::new(MemoryEngine::new());
    for sql in [T1, T2, T3] {
        engine.seed(sql).unwrap();
    }
    let store = Arc::new(DuckDbStore::open_memory().unwrap());
    Harness {
        sched: scheduler("0", store.clone(), engine.clone()),
        engine,
        store,
    }
}

impl Harness {
    pub async fn submit(&self, sql: &str, strategy: &str) -> Vec<MigrationUuid> {
        self.sched
            .submit(&SubmitRequest::new(sql, strategy))
            .await
            .unwrap()
    }

    pub async fn get(&self, uuid: &MigrationUuid) -> Migration {
        self.sched.get(uuid).await.unwrap().unwrap()
    }

    pub async fn all(&self) -> Vec<Migration> {
        self.sched
            .show(&shunt_meta::MigrationFilter::all())
            .await
            .unwrap()
    }

    /// Tick until `uuid` satisfies `pred`.
    pub async fn wait_for<F>(&self, uuid: &MigrationUuid, what: &str, pred: F) -> Migration
    where
        F: Fn(&Migration) -> bool,
    {
        let waited = tokio::time::timeout(WAIT, async {
            loop {
                self.sched.tick().await.unwrap();
                let m = self.get(uuid).await;
                if pred(&m) {
                    return m;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        match waited {
            Ok(m) => m,
            Err(_) => panic!("{} never became {}", uuid, what),
        }
    }

    pub async fn wait_status(&self, uuid: &MigrationUuid, status: MigrationStatus) -> Migration {
        self.wait_for(uuid, status.as_str(), |m| m.status == status)
            .await
    }

    /// Running, staged and waiting on the cut-over gate.
    pub async fn wait_ready_to_complete(&self, uuid: &MigrationUuid) -> Migration {
        self.wait_for(uuid, "ready to complete", |m| {
            m.status == MigrationStatus::Running && m.ready_to_complete
        })
        .await
    }

    /// Run a few ticks with pauses so workers can make progress.
    pub async fn settle(&self, ticks: usize) {
        for _ in 0..ticks {
            self.sched.tick().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
