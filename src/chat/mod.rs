//! Chat service: routes each message to onboarding or free-form chat.

pub mod locks;
pub mod prompt;

pub use locks::SessionLocks;
pub use prompt::build_messages;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DEFAULT_HISTORY_WINDOW, DEFAULT_SYSTEM_PROMPT};
use crate::error::DatabaseError;
use crate::llm::CompletionClient;
use crate::onboarding::{CapturedFields, QuestionTracker};
use crate::store::{Database, Role};

/// Settings for free-form conversation.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub system_prompt: String,
    /// Most recent turns sent as context with each free-form message.
    pub history_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Handles inbound chat messages end to end.
pub struct ChatService {
    db: Arc<dyn Database>,
    llm: Arc<dyn CompletionClient>,
    tracker: QuestionTracker,
    locks: Arc<SessionLocks>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Arc<dyn CompletionClient>,
        locks: Arc<SessionLocks>,
        config: ChatConfig,
    ) -> Self {
        Self {
            tracker: QuestionTracker::new(Arc::clone(&db)),
            db,
            llm,
            locks,
            config,
        }
    }

    /// Process one user message and return the text to show the user.
    ///
    /// Completion API failures come back as `Ok` with a readable error
    /// message; only storage failures are returned as errors.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
        captured: CapturedFields,
    ) -> Result<String, DatabaseError> {
        let _guard = self.locks.acquire(session_id).await;

        if let Some(question) = self.tracker.advance(session_id, message, captured).await? {
            return Ok(question);
        }

        self.free_form(session_id, message).await
    }

    async fn free_form(&self, session_id: &str, message: &str) -> Result<String, DatabaseError> {
        let history = self
            .db
            .read_turns(session_id, Some(self.config.history_window))
            .await?;

        self.db.append_turn(session_id, Role::User, message).await?;

        let messages = build_messages(&self.config.system_prompt, &history, message);
        match self.llm.complete(&messages).await {
            Ok(reply) => {
                self.db
                    .append_turn(session_id, Role::Assistant, &reply)
                    .await?;
                info!(
                    session_id = %session_id,
                    history = history.len(),
                    model = %self.llm.model_name(),
                    "Free-form reply stored"
                );
                Ok(reply)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Completion failed");
                Ok(e.to_string())
            }
        }
    }
}
