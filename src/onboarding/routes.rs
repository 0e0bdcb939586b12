//! REST endpoint for onboarding progress.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::tracker::QuestionTracker;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub tracker: Arc<QuestionTracker>,
}

/// GET /onboarding/{session_id}
///
/// Returns how far the session got through the questionnaire, or 404 if the
/// session doesn't exist.
async fn get_status(
    State(state): State<OnboardingRouteState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.tracker.status(&session_id).await {
        Ok(Some(status)) => Json(serde_json::json!(status)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Failed to read onboarding status");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/onboarding/{session_id}", get(get_status))
        .with_state(state)
}
