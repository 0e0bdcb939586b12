//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// System instruction sent ahead of every free-form conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a study advisor. Ask gentle questions about the user's screen time and study habits, \
then give advice that fits what they tell you. Don't just hand out advice: empathize with the \
user as you talk. Keep the tone friendly and relaxed rather than stiff or formal.";

pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DB_PATH: &str = "./data/chat.db";

/// Number of most recent turns sent as context with a free-form message.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Service configuration, read from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer credential for the completion API.
    pub api_key: SecretString,
    pub model: String,
    /// Base URL of the OpenAI-compatible API (no trailing `/chat/completions`).
    pub api_base: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub system_prompt: String,
    pub history_window: usize,
    /// No timeout when `None`.
    pub request_timeout: Option<Duration>,
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// `OPENROUTER_API_KEY` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let model = std::env::var("STUDY_COACH_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let api_base = std::env::var("STUDY_COACH_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let port: u16 = std::env::var("STUDY_COACH_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = std::env::var("STUDY_COACH_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB_PATH));

        let system_prompt = std::env::var("STUDY_COACH_SYSTEM_PROMPT")
            .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

        let history_window: usize = std::env::var("STUDY_COACH_HISTORY_WINDOW")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HISTORY_WINDOW);

        let request_timeout = std::env::var("STUDY_COACH_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            api_key: SecretString::from(api_key),
            model,
            api_base,
            port,
            db_path,
            system_prompt,
            history_window,
            request_timeout,
        })
    }
}
