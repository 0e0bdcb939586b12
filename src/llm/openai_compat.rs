//! OpenAI-compatible chat completions client.
//!
//! Works with OpenRouter, OpenAI, and anything else that speaks the
//! `/chat/completions` wire format.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;

use super::{ChatMessage, CompletionClient, LlmConfig};
use crate::error::LlmError;

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// HTTP client for an OpenAI-compatible completion endpoint.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    url: String,
    api_key: secrecy::SecretString,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| LlmError::RequestFailed {
            reason: format!("Failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            http,
            url: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let body = CompletionBody {
            model: &self.model,
            messages,
        };

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Completion API returned an error status");
            return Err(LlmError::Status { status, body });
        }

        let json: serde_json::Value =
            resp.json().await.map_err(|e| LlmError::InvalidResponse {
                reason: e.to_string(),
            })?;

        parse_reply(&json)
    }
}

/// Pull `choices[0].message.content` out of a completion response.
pub(crate) fn parse_reply(json: &serde_json::Value) -> Result<String, LlmError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse {
            reason: "missing choices[0].message.content".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_extracts_content() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Keep going!" } }]
        });
        assert_eq!(parse_reply(&json).unwrap(), "Keep going!");
    }

    #[test]
    fn parse_reply_rejects_missing_choices() {
        let json = serde_json::json!({ "error": { "message": "quota" } });
        let err = parse_reply(&json).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
        assert!(err.to_string().starts_with("Failed to read AI reply"));
    }

    #[test]
    fn parse_reply_rejects_non_string_content() {
        let json = serde_json::json!({ "choices": [{ "message": { "content": null } }] });
        assert!(parse_reply(&json).is_err());
    }

    #[test]
    fn url_joins_base_without_double_slash() {
        let config = LlmConfig {
            api_key: secrecy::SecretString::from("k"),
            model: "m".into(),
            api_base: "http://localhost:1234/v1/".into(),
            timeout: None,
        };
        let client = OpenAiCompatClient::new(&config).unwrap();
        assert_eq!(client.url, "http://localhost:1234/v1/chat/completions");
    }
}
