//! DuckDB execution engine.
//!
//! Online plans stage a shadow table with `CREATE TABLE .. AS SELECT` and
//! the ALTER clauses applied one by one. At cut-over rows are copied into the
//! shadow and the names are swapped in one transaction. Pre-images are kept
//! by rename.

use crate::cutover::{await_throttle, checkpoint, cut_over, Attempt};
use crate::error::{DbError, DbResult};
use crate::throttle::NeverThrottle;
use crate::traits::{
    EngineEvent, EventSender, ExecutionControl, ExecutionEngine, ExecutionOutcome, ExecutionPlan,
    ExecutionRequest, ObjectDefinition, SchemaInspector, ThrottleOracle,
};
use async_trait::async_trait;
use chrono::Utc;
use duckdb::Connection;
use shunt_core::{ArtifactKind, ArtifactName, MigrationUuid, ObjectKind};
use shunt_sql::StatementAnalyzer;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const OBJECT_KIND_SQL: &str = "SELECT 'table' FROM duckdb_tables() \
     WHERE schema_name = 'main' AND lower(table_name) = lower(?) \
     UNION ALL SELECT 'view' FROM duckdb_views() \
     WHERE schema_name = 'main' AND NOT internal AND lower(view_name) = lower(?)";

const TABLE_SQL: &str = "SELECT sql FROM duckdb_tables() \
     WHERE schema_name = 'main' AND lower(table_name) = lower(?)";

const VIEW_SQL: &str = "SELECT sql FROM duckdb_views() \
     WHERE schema_name = 'main' AND NOT internal AND lower(view_name) = lower(?)";

const COLUMNS_SQL: &str = "SELECT column_name FROM duckdb_columns() \
     WHERE schema_name = 'main' AND lower(table_name) = lower(?) ORDER BY column_index";

/// DuckDB target engine
pub struct DuckDbEngine {
    conn: Mutex<Connection>,
    analyzer: StatementAnalyzer,
    throttle: Arc<dyn ThrottleOracle>,
}

impl DuckDbEngine {
    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            analyzer: StatementAnalyzer::duckdb(),
            throttle: Arc::new(NeverThrottle),
        }
    }

    /// Create a new in-memory DuckDB target
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::with_connection(conn))
    }

    /// Open a DuckDB target from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", e, path.display())))?;
        Ok(Self::with_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn ThrottleOracle>) -> Self {
        self.throttle = throttle;
        self
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn quote(&self, name: &str) -> String {
        self.analyzer.quote_ident(name)
    }

    /// Execute a batch of statements directly on the target
    pub fn execute_batch(&self, sql: &str) -> DbResult<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    /// Row count of a query (for tests)
    pub fn query_count(&self, sql: &str) -> DbResult<usize> {
        let count: i64 = self.conn()?.query_row(
            &format!("SELECT COUNT(*) FROM ({})", sql),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn object_kind(conn: &Connection, name: &str) -> DbResult<Option<ObjectKind>> {
        let mut stmt = conn.prepare(OBJECT_KIND_SQL)?;
        let mut rows = stmt.query_map(duckdb::params![name, name], |row| row.get::<_, String>(0))?;
        match rows.next().transpose()? {
            Some(kind) => Ok(Some(kind.parse().map_err(|_| {
                DbError::Internal(format!("unexpected object kind '{}'", kind))
            })?)),
            None => Ok(None),
        }
    }

    fn require_kind(conn: &Connection, name: &str, object: ObjectKind) -> DbResult<()> {
        match Self::object_kind(conn, name)? {
            Some(actual) if actual == object => Ok(()),
            Some(actual) => Err(DbError::InvalidPlan(format!(
                "{} is a {}, not a {}",
                name, actual, object
            ))),
            None => Err(DbError::ObjectNotFound(name.to_string())),
        }
    }

    fn require_absent(conn: &Connection, name: &str) -> DbResult<()> {
        match Self::object_kind(conn, name)? {
            Some(_) => Err(DbError::ObjectExists(name.to_string())),
            None => Ok(()),
        }
    }

    fn columns(conn: &Connection, name: &str) -> DbResult<Vec<String>> {
        let mut stmt = conn.prepare(COLUMNS_SQL)?;
        let columns = stmt
            .query_map(duckdb::params![name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Execute `body` within a `BEGIN` / `COMMIT` transaction, rolling back
    /// on error.
    fn transaction<F, T>(conn: &Connection, body: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        conn.execute_batch("BEGIN TRANSACTION")?;
        let result = body(conn);
        match &result {
            Ok(_) => {
                if let Err(commit_err) = conn.execute_batch("COMMIT") {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(DbError::ExecutionError(format!(
                        "COMMIT failed: {}",
                        commit_err
                    )));
                }
            }
            Err(_) => {
                let _ = conn.execute_batch("ROLLBACK");
            }
        }
        result
    }

    fn rename_sql(&self, object: ObjectKind, from: &str, to: &str) -> String {
        format!(
            "ALTER {} {} RENAME TO {}",
            object.keyword(),
            self.quote(from),
            self.quote(to)
        )
    }

    fn drop_sql(&self, object: ObjectKind, name: &str) -> String {
        format!("DROP {} {}", object.keyword(), self.quote(name))
    }

    /// `ALTER TABLE` statements applying each clause of `alter_sql` to `target`.
    fn alter_statements(&self, target: &str, alter_sql: &str) -> DbResult<Vec<String>> {
        Ok(self
            .analyzer
            .alter_clauses(alter_sql)?
            .into_iter()
            .map(|clause| format!("ALTER TABLE {} {}", self.quote(target), clause))
            .collect())
    }

    fn held_name(uuid: &MigrationUuid) -> String {
        ArtifactName::new(ArtifactKind::Held, uuid, Utc::now()).to_string()
    }

    /// Signal readiness, then run `step` once the gate opens.
    async fn finish<F>(
        &self,
        control: &mut ExecutionControl,
        events: &EventSender,
        mut step: F,
    ) -> DbResult<()>
    where
        F: FnMut(&Connection) -> DbResult<()>,
    {
        let _ = events.send(EngineEvent::Progress { percent: 100.0 });
        let _ = events.send(EngineEvent::ReadyToComplete);
        // A single embedded connection has no competing sessions to wait on.
        cut_over(control, events, Duration::ZERO, |_gate| {
            let conn = self.conn()?;
            step(&conn)?;
            Ok(Attempt::Done)
        })
        .await
    }

    async fn run_alter(
        &self,
        request: &ExecutionRequest,
        name: &str,
        sql: &str,
        control: &mut ExecutionControl,
        events: &EventSender,
    ) -> DbResult<ExecutionOutcome> {
        Self::require_kind(&*self.conn()?, name, ObjectKind::Table)?;
        let in_place = !request.strategy.keeps_artifacts()
            || (request.prefer_instant_ddl && self.analyzer.is_instant_alter(sql)?);
        if in_place {
            let statements = self.alter_statements(name, sql)?;
            self.finish(control, events, |conn| {
                Self::transaction(conn, |c| {
                    for statement in &statements {
                        c.execute_batch(statement)?;
                    }
                    Ok(())
                })
            })
            .await?;
            return Ok(ExecutionOutcome::default());
        }

        let shadow = ArtifactName::new(ArtifactKind::Shadow, &request.uuid, Utc::now()).to_string();
        let statements = self.alter_statements(&shadow, sql)?;
        {
            let conn = self.conn()?;
            conn.execute_batch(&format!(
                "CREATE TABLE {} AS SELECT * FROM {} LIMIT 0",
                self.quote(&shadow),
                self.quote(name)
            ))?;
        }
        let _ = events.send(EngineEvent::ArtifactCreated(shadow.clone()));
        log::debug!("Created shadow {} for {}", shadow, name);

        let held = Self::held_name(&request.uuid);
        let staged = async {
            {
                let conn = self.conn()?;
                for statement in &statements {
                    conn.execute_batch(statement)?;
                }
            }
            let mut last_ratio = 0.0;
            await_throttle(
                self.throttle.as_ref(),
                "online-ddl",
                control,
                events,
                Duration::from_millis(100),
                &mut last_ratio,
            )
            .await?;
            self.finish(control, events, |conn| {
                let target: Vec<String> = Self::columns(conn, &shadow)?;
                let common: Vec<String> = Self::columns(conn, name)?
                    .into_iter()
                    .filter(|c| target.iter().any(|t| t.eq_ignore_ascii_case(c)))
                    .map(|c| self.quote(&c))
                    .collect();
                if !common.is_empty() {
                    let list = common.join(", ");
                    conn.execute_batch(&format!(
                        "INSERT INTO {} ({}) SELECT {} FROM {}",
                        self.quote(&shadow),
                        list,
                        list,
                        self.quote(name)
                    ))?;
                }
                Self::transaction(conn, |c| {
                    c.execute_batch(&self.rename_sql(ObjectKind::Table, name, &held))?;
                    c.execute_batch(&self.rename_sql(ObjectKind::Table, &shadow, name))?;
                    Ok(())
                })
            })
            .await
        }
        .await;

        if let Err(e) = staged {
            if let Ok(conn) = self.conn() {
                let _ = conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", self.quote(&shadow)));
            }
            return Err(e);
        }
        Ok(ExecutionOutcome {
            artifacts: vec![held],
        })
    }
}

#[async_trait]
impl SchemaInspector for DuckDbEngine {
    async fn show_create(&self, name: &str) -> DbResult<Option<ObjectDefinition>> {
        let conn = self.conn()?;
        let Some(object) = Self::object_kind(&conn, name)? else {
            return Ok(None);
        };
        let query = match object {
            ObjectKind::Table => TABLE_SQL,
            ObjectKind::View => VIEW_SQL,
        };
        let mut stmt = conn.prepare(query)?;
        let mut rows = stmt.query_map(duckdb::params![name], |row| row.get::<_, String>(0))?;
        Ok(rows
            .next()
            .transpose()?
            .map(|sql| ObjectDefinition { object, sql }))
    }
}

#[async_trait]
impl ExecutionEngine for DuckDbEngine {
    fn engine_type(&self) -> &'static str {
        "duckdb"
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        mut control: ExecutionControl,
        events: EventSender,
    ) -> DbResult<ExecutionOutcome> {
        checkpoint(&control)?;
        log::info!(
            "Executing {} plan for {} on duckdb ({})",
            request.plan.action(),
            request.uuid,
            request.strategy
        );
        let keep = request.strategy.keeps_artifacts();
        let control = &mut control;
        let events = &events;

        match &request.plan {
            ExecutionPlan::Noop { reason } => {
                log::info!("Nothing to execute for {}: {}", request.uuid, reason);
                Ok(ExecutionOutcome::default())
            }
            ExecutionPlan::Create { name, sql, .. } => {
                Self::require_absent(&*self.conn()?, name)?;
                self.finish(control, events, |conn| Ok(conn.execute_batch(sql)?))
                    .await?;
                Ok(ExecutionOutcome::default())
            }
            ExecutionPlan::Alter { name, sql } => {
                self.run_alter(&request, name, sql, control, events).await
            }
            ExecutionPlan::Drop { object, name } => {
                Self::require_kind(&*self.conn()?, name, *object)?;
                let held = Self::held_name(&request.uuid);
                let statement = if keep {
                    self.rename_sql(*object, name, &held)
                } else {
                    self.drop_sql(*object, name)
                };
                self.finish(control, events, |conn| Ok(conn.execute_batch(&statement)?))
                    .await?;
                Ok(ExecutionOutcome {
                    artifacts: if keep { vec![held] } else { Vec::new() },
                })
            }
            ExecutionPlan::Replace { object, name, sql } => {
                Self::require_kind(&*self.conn()?, name, *object)?;
                let held = Self::held_name(&request.uuid);
                let first = if keep {
                    self.rename_sql(*object, name, &held)
                } else {
                    self.drop_sql(*object, name)
                };
                self.finish(control, events, |conn| {
                    Self::transaction(conn, |c| {
                        c.execute_batch(&first)?;
                        c.execute_batch(sql)?;
                        Ok(())
                    })
                })
                .await?;
                Ok(ExecutionOutcome {
                    artifacts: if keep { vec![held] } else { Vec::new() },
                })
            }
            ExecutionPlan::Swap {
                object,
                name,
                artifact,
            } => {
                {
                    let conn = self.conn()?;
                    Self::require_kind(&conn, name, *object)?;
                    Self::require_kind(&conn, artifact, *object)?;
                }
                let held = Self::held_name(&request.uuid);
                self.finish(control, events, |conn| {
                    Self::transaction(conn, |c| {
                        c.execute_batch(&self.rename_sql(*object, name, &held))?;
                        c.execute_batch(&self.rename_sql(*object, artifact, name))?;
                        Ok(())
                    })
                })
                .await?;
                Ok(ExecutionOutcome {
                    artifacts: vec![held],
                })
            }
            ExecutionPlan::Restore {
                object,
                name,
                artifact,
            } => {
                {
                    let conn = self.conn()?;
                    Self::require_kind(&conn, artifact, *object)?;
                    Self::require_absent(&conn, name)?;
                }
                self.finish(control, events, |conn| {
                    Ok(conn.execute_batch(&self.rename_sql(*object, artifact, name))?)
                })
                .await?;
                Ok(ExecutionOutcome::default())
            }
        }
    }

    async fn drop_artifact(&self, name: &str) -> DbResult<()> {
        if ArtifactName::parse(name).is_none() {
            return Err(DbError::InvalidPlan(format!(
                "refusing to drop {}: not an artifact name",
                name
            )));
        }
        let conn = self.conn()?;
        if let Some(object) = Self::object_kind(&conn, name)? {
            conn.execute_batch(&self.drop_sql(object, name))?;
            log::debug!("Dropped artifact {}", name);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
