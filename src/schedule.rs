//! Screen-time logging and schedule advice.
//!
//! Users report how many hours they spent studying, on social media, and on
//! games. The latest report feeds a one-shot prompt asking the completion API
//! for a daily schedule; the advice is stored alongside the prompt.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::llm::{ChatMessage, CompletionClient};
use crate::store::{Database, SchedulePlan, ScreenTimeLog, default_title};

/// Returned by `plan_schedule` when there is nothing to plan from.
pub const NO_SCREEN_TIME_MESSAGE: &str =
    "No screen time recorded yet. Log your study, social media, and game hours first.";

/// Records screen time and turns it into scheduling advice.
pub struct ScheduleService {
    db: Arc<dyn Database>,
    llm: Arc<dyn CompletionClient>,
    system_prompt: String,
}

impl ScheduleService {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Arc<dyn CompletionClient>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            db,
            llm,
            system_prompt: system_prompt.into(),
        }
    }

    /// Store one day's hours for a session, creating the session if needed.
    pub async fn record_screen_time(
        &self,
        session_id: &str,
        study_hours: f64,
        sns_hours: f64,
        game_hours: f64,
    ) -> Result<ScreenTimeLog, DatabaseError> {
        self.db
            .ensure_session(session_id, &default_title(session_id))
            .await?;

        let log = ScreenTimeLog {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            study_hours,
            sns_hours,
            game_hours,
            recorded_at: Utc::now(),
        };
        self.db.insert_screen_time(&log).await?;
        info!(
            session_id = %session_id,
            study_hours,
            sns_hours,
            game_hours,
            "Screen time recorded"
        );
        Ok(log)
    }

    /// Ask for a schedule based on the most recent screen-time entry.
    ///
    /// Like free-form chat, completion failures are returned as readable text
    /// and nothing is stored for them.
    pub async fn plan_schedule(&self, session_id: &str) -> Result<String, DatabaseError> {
        let Some(log) = self.db.latest_screen_time(session_id).await? else {
            return Ok(NO_SCREEN_TIME_MESSAGE.to_string());
        };

        let username = self
            .db
            .get_session(session_id)
            .await?
            .and_then(|s| s.username);

        let prompt = build_schedule_prompt(&log, username.as_deref());
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(prompt.as_str()),
        ];

        let advice = match self.llm.complete(&messages).await {
            Ok(advice) => advice,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Schedule completion failed");
                return Ok(e.to_string());
            }
        };

        let plan = serde_json::json!({
            "prompt": prompt,
            "advice": advice,
            "screen_time_id": log.id,
        });
        self.db
            .insert_schedule_plan(&SchedulePlan {
                id: Uuid::new_v4(),
                session_id: session_id.to_string(),
                plan: plan.to_string(),
                created_at: Utc::now(),
            })
            .await?;

        info!(session_id = %session_id, "Schedule plan stored");
        Ok(advice)
    }
}

/// Build the user prompt asking for a schedule from a screen-time entry.
pub fn build_schedule_prompt(log: &ScreenTimeLog, username: Option<&str>) -> String {
    let who = username
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| format!("{n} reported"))
        .unwrap_or_else(|| "I spent".to_string());
    format!(
        "Yesterday {who} {study} hours studying, {sns} hours on social media, and {game} hours \
         playing games. Suggest a realistic schedule for tomorrow that makes more room for \
         studying, with concrete time blocks and short breaks. Keep it encouraging.",
        study = log.study_hours,
        sns = log.sns_hours,
        game = log.game_hours,
    )
}
