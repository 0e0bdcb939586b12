//! Completion API integration for Study Coach.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (OpenRouter by
//! default) through the `CompletionClient` trait, so handlers and tests can
//! swap in a stub.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::LlmError;
use crate::store::Role;

/// Role of a message sent to the completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

/// One entry in the completion request's `messages` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Something that turns a message list into a reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send the messages and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Configuration for creating a completion client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub api_base: String,
    pub timeout: Option<Duration>,
}

impl From<&AppConfig> for LlmConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            timeout: config.request_timeout,
        }
    }
}

/// Create a completion client from configuration.
pub fn create_provider(config: &LlmConfig) -> crate::error::Result<Arc<dyn CompletionClient>> {
    let client = OpenAiCompatClient::new(config)?;
    tracing::info!(model = %config.model, base = %config.api_base, "Using completion API");
    Ok(Arc::new(client))
}
