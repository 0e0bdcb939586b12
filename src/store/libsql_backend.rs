//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{
    Database, OnboardingStep, ProfileField, Role, SchedulePlan, ScreenTimeLog, Session, Turn,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
///
/// Writes go through `write_gate` so a statement from another request can
/// never land inside an open transaction on the shared connection.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_gate: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_gate: Mutex::new(()),
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_gate: Mutex::new(()),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

const SESSION_COLUMNS: &str =
    "id, session_id, title, question_index, username, study_time, phone_time";

/// Map a libsql Row to a Session. Column order matches SESSION_COLUMNS.
fn row_to_session(row: &libsql::Row) -> Result<Session, libsql::Error> {
    let question_index: i64 = row.get(3)?;
    Ok(Session {
        id: row.get(0)?,
        session_id: row.get(1)?,
        title: row.get(2)?,
        question_index: u32::try_from(question_index).unwrap_or(0),
        username: row.get::<String>(4).ok(),
        study_time: row.get::<String>(5).ok(),
        phone_time: row.get::<String>(6).ok(),
    })
}

const TURN_COLUMNS: &str = "seq, session_id, role, content, created_at";

fn row_to_turn(row: &libsql::Row) -> Result<Turn, DatabaseError> {
    let role_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("turn role: {e}")))?;
    let role = role_str
        .parse::<Role>()
        .map_err(DatabaseError::Serialization)?;
    let created_str: String = row.get(4).unwrap_or_default();
    Ok(Turn {
        seq: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("turn seq: {e}")))?,
        session_id: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("turn session_id: {e}")))?,
        role,
        content: row
            .get(3)
            .map_err(|e| DatabaseError::Query(format!("turn content: {e}")))?,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_screen_time(row: &libsql::Row) -> Result<ScreenTimeLog, libsql::Error> {
    let id_str: String = row.get(0)?;
    let recorded_str: String = row.get(5)?;
    Ok(ScreenTimeLog {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        session_id: row.get(1)?,
        study_hours: row.get(2)?,
        sns_hours: row.get(3)?,
        game_hours: row.get(4)?,
        recorded_at: parse_datetime(&recorded_str),
    })
}

fn row_to_plan(row: &libsql::Row) -> Result<SchedulePlan, libsql::Error> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(3)?;
    Ok(SchedulePlan {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        session_id: row.get(1)?,
        plan: row.get(2)?,
        created_at: parse_datetime(&created_str),
    })
}

// ── Statements shared by single writes and transactions ─────────────

async fn insert_turn(
    conn: &Connection,
    session_id: &str,
    role: Role,
    content: &str,
) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO turns (session_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![session_id, role.as_str(), content, now],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("append_turn: {e}")))?;
    Ok(())
}

async fn update_profile_field(
    conn: &Connection,
    session_id: &str,
    field: ProfileField,
    value: &str,
) -> Result<(), DatabaseError> {
    let sql = format!(
        "UPDATE sessions SET {} = ?1 WHERE session_id = ?2",
        field.column()
    );
    conn.execute(&sql, params![value, session_id])
        .await
        .map_err(|e| DatabaseError::Query(format!("set_profile_field: {e}")))?;
    Ok(())
}

/// Increment the cursor unless it already reached `limit`, then read it back.
async fn advance_question_index(
    conn: &Connection,
    session_id: &str,
    limit: u32,
) -> Result<u32, DatabaseError> {
    // The guard keeps the cursor bounded even if two writers race.
    conn.execute(
        "UPDATE sessions SET question_index = question_index + 1
         WHERE session_id = ?1 AND question_index < ?2",
        params![session_id, i64::from(limit)],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("advance_question_index: {e}")))?;

    let mut rows = conn
        .query(
            "SELECT question_index FROM sessions WHERE session_id = ?1",
            params![session_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("advance_question_index: {e}")))?;
    match rows.next().await {
        Ok(Some(row)) => {
            let cursor: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("question_index: {e}")))?;
            Ok(u32::try_from(cursor).unwrap_or(0))
        }
        Ok(None) => Err(DatabaseError::NotFound {
            entity: "session".to_string(),
            id: session_id.to_string(),
        }),
        Err(e) => Err(DatabaseError::Query(format!("advance_question_index: {e}"))),
    }
}

async fn apply_onboarding_step(
    conn: &Connection,
    step: &OnboardingStep<'_>,
) -> Result<u32, DatabaseError> {
    insert_turn(conn, step.session_id, Role::User, step.answer).await?;
    if let Some(field) = step.field {
        update_profile_field(conn, step.session_id, field, step.answer).await?;
    }
    let cursor = advance_question_index(conn, step.session_id, step.limit).await?;
    insert_turn(conn, step.session_id, Role::Assistant, step.question).await?;
    Ok(cursor)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_id = ?1"),
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_session(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("get_session row: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn ensure_session(
        &self,
        session_id: &str,
        title: &str,
    ) -> Result<Session, DatabaseError> {
        let _write = self.write_gate.lock().await;
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT INTO sessions (session_id, title, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (session_id) DO NOTHING",
                params![session_id, title, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("ensure_session: {e}")))?;

        if inserted > 0 {
            debug!(session_id = %session_id, "Session created");
        }

        self.get_session(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "session".to_string(),
                id: session_id.to_string(),
            })
    }

    async fn list_sessions(&self) -> Result<Vec<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY id ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_sessions: {e}")))?;

        let mut sessions = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_sessions: {e}")))?
        {
            sessions.push(
                row_to_session(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_sessions row: {e}")))?,
            );
        }
        Ok(sessions)
    }

    async fn record_onboarding_step(
        &self,
        step: &OnboardingStep<'_>,
    ) -> Result<u32, DatabaseError> {
        let _write = self.write_gate.lock().await;
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("begin onboarding step: {e}")))?;

        match apply_onboarding_step(&tx, step).await {
            Ok(cursor) => {
                tx.commit()
                    .await
                    .map_err(|e| DatabaseError::Query(format!("commit onboarding step: {e}")))?;
                Ok(cursor)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(
                        session_id = %step.session_id,
                        error = %rollback,
                        "Onboarding step rollback failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn set_profile_field(
        &self,
        session_id: &str,
        field: ProfileField,
        value: &str,
    ) -> Result<(), DatabaseError> {
        let _write = self.write_gate.lock().await;
        update_profile_field(self.conn(), session_id, field, value).await
    }

    // ── Turns ───────────────────────────────────────────────────────

    async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), DatabaseError> {
        let _write = self.write_gate.lock().await;
        insert_turn(self.conn(), session_id, role, content).await
    }

    async fn read_turns(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Turn>, DatabaseError> {
        let conn = self.conn();
        let mut rows = match limit {
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                conn.query(
                    &format!(
                        "SELECT {TURN_COLUMNS} FROM (
                            SELECT {TURN_COLUMNS} FROM turns
                            WHERE session_id = ?1 ORDER BY seq DESC LIMIT ?2
                         ) ORDER BY seq ASC"
                    ),
                    params![session_id, limit],
                )
                .await
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {TURN_COLUMNS} FROM turns WHERE session_id = ?1 ORDER BY seq ASC"
                    ),
                    params![session_id],
                )
                .await
            }
        }
        .map_err(|e| DatabaseError::Query(format!("read_turns: {e}")))?;

        let mut turns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("read_turns: {e}")))?
        {
            turns.push(row_to_turn(&row)?);
        }
        Ok(turns)
    }

    async fn delete_last_pair(&self, session_id: &str) -> Result<usize, DatabaseError> {
        let _write = self.write_gate.lock().await;
        let conn = self.conn();
        let mut removed = 0u64;
        for role in [Role::User, Role::Assistant] {
            removed += conn
                .execute(
                    "DELETE FROM turns WHERE seq = (
                        SELECT MAX(seq) FROM turns WHERE session_id = ?1 AND role = ?2
                     )",
                    params![session_id, role.as_str()],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("delete_last_pair: {e}")))?;
        }
        debug!(session_id = %session_id, removed, "Deleted last turn pair");
        Ok(usize::try_from(removed).unwrap_or(usize::MAX))
    }

    // ── Screen time ─────────────────────────────────────────────────

    async fn insert_screen_time(&self, log: &ScreenTimeLog) -> Result<(), DatabaseError> {
        let _write = self.write_gate.lock().await;
        self.conn()
            .execute(
                "INSERT INTO screen_time_logs
                    (id, session_id, study_hours, sns_hours, game_hours, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    log.id.to_string(),
                    log.session_id.as_str(),
                    log.study_hours,
                    log.sns_hours,
                    log.game_hours,
                    log.recorded_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_screen_time: {e}")))?;
        Ok(())
    }

    async fn latest_screen_time(
        &self,
        session_id: &str,
    ) -> Result<Option<ScreenTimeLog>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, session_id, study_hours, sns_hours, game_hours, recorded_at
                 FROM screen_time_logs WHERE session_id = ?1
                 ORDER BY rowid DESC LIMIT 1",
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_screen_time: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_screen_time(&row)
                .map(Some)
                .map_err(|e| DatabaseError::Query(format!("latest_screen_time row: {e}"))),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("latest_screen_time: {e}"))),
        }
    }

    async fn insert_schedule_plan(&self, plan: &SchedulePlan) -> Result<(), DatabaseError> {
        let _write = self.write_gate.lock().await;
        self.conn()
            .execute(
                "INSERT INTO schedule_plans (id, session_id, plan, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    plan.id.to_string(),
                    plan.session_id.as_str(),
                    plan.plan.as_str(),
                    plan.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_schedule_plan: {e}")))?;
        Ok(())
    }

    async fn list_schedule_plans(
        &self,
        session_id: &str,
    ) -> Result<Vec<SchedulePlan>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, session_id, plan, created_at FROM schedule_plans
                 WHERE session_id = ?1 ORDER BY rowid DESC",
                params![session_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_schedule_plans: {e}")))?;

        let mut plans = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_schedule_plans: {e}")))?
        {
            plans.push(
                row_to_plan(&row)
                    .map_err(|e| DatabaseError::Query(format!("list_schedule_plans row: {e}")))?,
            );
        }
        Ok(plans)
    }
}
