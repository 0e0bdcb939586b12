//! QuestionTracker: walks a session through the onboarding questions.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::{Database, OnboardingStep, ProfileField, Session, default_title};

use super::questions::{QUESTIONS, capture_field, question_count, render_question};

/// Profile values the client may send alongside a chat message.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CapturedFields {
    pub study_time: Option<f64>,
    pub phone_time: Option<f64>,
}

/// Tracks onboarding progress per session and serves the canned questions.
pub struct QuestionTracker {
    db: Arc<dyn Database>,
}

impl QuestionTracker {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Feed one user message through onboarding.
    ///
    /// Returns the next canned question, or `None` once the session has
    /// answered every question and the message belongs to free-form chat.
    /// Creates the session on first contact.
    pub async fn advance(
        &self,
        session_id: &str,
        answer: &str,
        captured: CapturedFields,
    ) -> Result<Option<String>, DatabaseError> {
        let session = self
            .db
            .ensure_session(session_id, &default_title(session_id))
            .await?;

        self.record_captured(session_id, captured).await?;

        let cursor = session.question_index;
        let Some(question) = QUESTIONS.get(cursor as usize) else {
            debug!(session_id = %session_id, "Onboarding complete, free-form message");
            return Ok(None);
        };

        let field = capture_field(cursor);
        let name = match field {
            Some(ProfileField::Username) => Some(answer),
            _ => session.username.as_deref(),
        };
        let prompt = render_question(question, name);

        let new_cursor = self
            .db
            .record_onboarding_step(&OnboardingStep {
                session_id,
                answer,
                field,
                question: &prompt,
                limit: question_count(),
            })
            .await?;

        info!(
            session_id = %session_id,
            question = cursor,
            cursor = new_cursor,
            "Served onboarding question"
        );
        Ok(Some(prompt))
    }

    /// Current onboarding progress for a session, or `None` if it doesn't exist.
    pub async fn status(&self, session_id: &str) -> Result<Option<OnboardingStatus>, DatabaseError> {
        Ok(self
            .db
            .get_session(session_id)
            .await?
            .map(OnboardingStatus::from_session))
    }

    async fn record_captured(
        &self,
        session_id: &str,
        captured: CapturedFields,
    ) -> Result<(), DatabaseError> {
        if let Some(hours) = captured.study_time {
            self.db
                .set_profile_field(session_id, ProfileField::StudyTime, &hours.to_string())
                .await?;
        }
        if let Some(hours) = captured.phone_time {
            self.db
                .set_profile_field(session_id, ProfileField::PhoneTime, &hours.to_string())
                .await?;
        }
        Ok(())
    }
}

/// Onboarding status returned by the REST endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OnboardingStatus {
    pub session_id: String,
    pub question_index: u32,
    pub question_count: u32,
    pub onboarding_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_hours: Option<f64>,
}

impl OnboardingStatus {
    fn from_session(session: Session) -> Self {
        Self {
            question_index: session.question_index,
            question_count: question_count(),
            onboarding_completed: session.question_index >= question_count(),
            study_hours: session.study_hours(),
            phone_hours: session.phone_hours(),
            username: session.username,
            session_id: session.session_id,
        }
    }
}
