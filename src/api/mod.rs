//! HTTP API: axum routes for chat, history, sessions, and screen time.

pub mod routes;

pub use routes::{AppState, app_routes};
