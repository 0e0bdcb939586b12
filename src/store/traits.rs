//! `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Writes that make up one answered onboarding question.
#[derive(Debug, Clone, Copy)]
pub struct OnboardingStep<'a> {
    pub session_id: &'a str,
    pub answer: &'a str,
    /// Profile field the answer fills, if any.
    pub field: Option<ProfileField>,
    /// Rendered question stored as the assistant turn.
    pub question: &'a str,
    /// Number of onboarding questions; the cursor never passes it.
    pub limit: u32,
}

/// A persisted chat session with its onboarding cursor and captured profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Row id assigned by the database.
    pub id: i64,
    pub session_id: String,
    pub title: String,
    /// Index into the onboarding question list. Never decreases.
    pub question_index: u32,
    pub username: Option<String>,
    /// Self-reported study hours, stored verbatim.
    pub study_time: Option<String>,
    /// Self-reported phone hours, stored verbatim.
    pub phone_time: Option<String>,
}

impl Session {
    /// Study hours as a number, if the stored answer parses as one.
    pub fn study_hours(&self) -> Option<f64> {
        parse_hours(self.study_time.as_deref())
    }

    /// Phone hours as a number, if the stored answer parses as one.
    pub fn phone_hours(&self) -> Option<f64> {
        parse_hours(self.phone_time.as_deref())
    }
}

fn parse_hours(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|h| h.is_finite())
}

/// Default title for sessions created implicitly by a first message.
pub fn default_title(session_id: &str) -> String {
    format!("Session {session_id}")
}

/// One stored message in a session's conversation log.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// Monotonic creation order.
    pub seq: i64,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A profile field the onboarding flow can write into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Username,
    StudyTime,
    PhoneTime,
}

impl ProfileField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::StudyTime => "study_time",
            Self::PhoneTime => "phone_time",
        }
    }
}

/// Daily hours reported through `/screen_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenTimeLog {
    pub id: Uuid,
    pub session_id: String,
    pub study_hours: f64,
    pub sns_hours: f64,
    pub game_hours: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A stored scheduling-advice result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulePlan {
    pub id: Uuid,
    pub session_id: String,
    /// Serialized JSON `{prompt, advice}`.
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic database trait covering sessions, turns, and screen time.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Get a session by its caller-supplied identifier.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>, DatabaseError>;

    /// Return the session, creating it with cursor 0 if it doesn't exist.
    /// An existing session keeps its title.
    async fn ensure_session(&self, session_id: &str, title: &str)
    -> Result<Session, DatabaseError>;

    /// All sessions in creation order.
    async fn list_sessions(&self) -> Result<Vec<Session>, DatabaseError>;

    /// Apply one onboarding step atomically: the answer turn, the optional
    /// profile write, the cursor increment (bounded by `limit`) and the
    /// question turn either all land or none do.
    ///
    /// Returns the cursor after the step.
    async fn record_onboarding_step(&self, step: &OnboardingStep<'_>)
    -> Result<u32, DatabaseError>;

    /// Write a verbatim value into one of the captured profile fields.
    async fn set_profile_field(
        &self,
        session_id: &str,
        field: ProfileField,
        value: &str,
    ) -> Result<(), DatabaseError>;

    // ── Turns ───────────────────────────────────────────────────────

    /// Append a turn to a session's log.
    async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), DatabaseError>;

    /// Read a session's turns in creation order. With `limit`, only the most
    /// recent `limit` turns are returned (still oldest first).
    async fn read_turns(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Turn>, DatabaseError>;

    /// Remove the most recent user turn and the most recent assistant turn.
    /// Returns how many rows were removed (0, 1, or 2).
    async fn delete_last_pair(&self, session_id: &str) -> Result<usize, DatabaseError>;

    // ── Screen time ─────────────────────────────────────────────────

    async fn insert_screen_time(&self, log: &ScreenTimeLog) -> Result<(), DatabaseError>;

    /// Most recently recorded screen-time entry for a session.
    async fn latest_screen_time(
        &self,
        session_id: &str,
    ) -> Result<Option<ScreenTimeLog>, DatabaseError>;

    async fn insert_schedule_plan(&self, plan: &SchedulePlan) -> Result<(), DatabaseError>;

    /// Stored plans for a session, newest first. Served by `GET /plans/{session_id}`.
    async fn list_schedule_plans(
        &self,
        session_id: &str,
    ) -> Result<Vec<SchedulePlan>, DatabaseError>;
}
