//! REST endpoints.
//!
//! Completion failures are reported inside a normal `{response}` body; only
//! storage failures turn into a 500.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::chat::{ChatService, SessionLocks};
use crate::onboarding::{CapturedFields, OnboardingRouteState, QuestionTracker, onboarding_routes};
use crate::schedule::ScheduleService;
use crate::store::Database;

const INDEX_HTML: &str = include_str!("index.html");

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub chat: Arc<ChatService>,
    pub schedule: Arc<ScheduleService>,
    /// Shared with `chat` so deletes don't interleave with a message in flight.
    pub locks: Arc<SessionLocks>,
}

/// Build the full application router.
pub fn app_routes(state: AppState) -> Router {
    let onboarding = onboarding_routes(OnboardingRouteState {
        tracker: Arc::new(QuestionTracker::new(Arc::clone(&state.db))),
    });

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/history/{session_id}", get(history))
        .route("/delete_last/{session_id}", delete(delete_last))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/screen_time", post(record_screen_time))
        .route("/plan_schedule", post(plan_schedule))
        .route("/plans/{session_id}", get(list_plans))
        .with_state(state)
        .merge(onboarding)
        .layer(CorsLayer::permissive())
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> Response {
    error!(error = %e, "{context} failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
        .into_response()
}

// ── Pages ───────────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "study-coach"
    }))
}

// ── Chat ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    session_id: String,
    #[serde(default)]
    study_time: Option<f64>,
    #[serde(default)]
    phone_time: Option<f64>,
}

async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> Response {
    let captured = CapturedFields {
        study_time: body.study_time,
        phone_time: body.phone_time,
    };
    match state
        .chat
        .handle_message(&body.session_id, &body.message, captured)
        .await
    {
        Ok(response) => Json(serde_json::json!({ "response": response })).into_response(),
        Err(e) => internal_error("chat", e),
    }
}

async fn history(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.db.read_turns(&session_id, None).await {
        Ok(turns) => {
            let history: Vec<serde_json::Value> = turns
                .iter()
                .map(|t| serde_json::json!({ "role": t.role, "content": t.content }))
                .collect();
            Json(serde_json::json!({ "history": history })).into_response()
        }
        Err(e) => internal_error("history", e),
    }
}

async fn delete_last(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    let _guard = state.locks.acquire(&session_id).await;
    match state.db.delete_last_pair(&session_id).await {
        Ok(removed) => {
            info!(session_id = %session_id, removed, "Last turn pair deleted");
            Json(serde_json::json!({ "status": "deleted" })).into_response()
        }
        Err(e) => internal_error("delete_last", e),
    }
}

// ── Sessions ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateSessionRequest {
    session_id: String,
    title: String,
}

async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    match state.db.ensure_session(&body.session_id, &body.title).await {
        Ok(session) => Json(session).into_response(),
        Err(e) => internal_error("create_session", e),
    }
}

async fn list_sessions(State(state): State<AppState>) -> Response {
    match state.db.list_sessions().await {
        Ok(sessions) => Json(sessions).into_response(),
        Err(e) => internal_error("list_sessions", e),
    }
}

// ── Screen time ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ScreenTimeRequest {
    session_id: String,
    #[serde(default)]
    study_hours: f64,
    #[serde(default)]
    sns_hours: f64,
    #[serde(default)]
    game_hours: f64,
}

async fn record_screen_time(
    State(state): State<AppState>,
    Json(body): Json<ScreenTimeRequest>,
) -> Response {
    match state
        .schedule
        .record_screen_time(
            &body.session_id,
            body.study_hours,
            body.sns_hours,
            body.game_hours,
        )
        .await
    {
        Ok(log) => Json(serde_json::json!({ "status": "recorded", "id": log.id })).into_response(),
        Err(e) => internal_error("screen_time", e),
    }
}

#[derive(Deserialize)]
struct PlanRequest {
    session_id: String,
}

async fn plan_schedule(State(state): State<AppState>, Json(body): Json<PlanRequest>) -> Response {
    match state.schedule.plan_schedule(&body.session_id).await {
        Ok(response) => Json(serde_json::json!({ "response": response })).into_response(),
        Err(e) => internal_error("plan_schedule", e),
    }
}

async fn list_plans(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.db.list_schedule_plans(&session_id).await {
        Ok(plans) => {
            let plans: Vec<serde_json::Value> = plans
                .iter()
                .map(|p| {
                    let stored = serde_json::from_str::<serde_json::Value>(&p.plan)
                        .unwrap_or_else(|_| serde_json::Value::String(p.plan.clone()));
                    serde_json::json!({
                        "id": p.id,
                        "created_at": p.created_at,
                        "prompt": stored.get("prompt"),
                        "advice": stored.get("advice"),
                    })
                })
                .collect();
            Json(serde_json::json!({ "plans": plans })).into_response()
        }
        Err(e) => internal_error("list_plans", e),
    }
}
