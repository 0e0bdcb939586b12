//! Persistence layer: libSQL-backed storage for sessions, turns, and screen time.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    Database, OnboardingStep, ProfileField, Role, SchedulePlan, ScreenTimeLog, Session, Turn, default_title,
};
