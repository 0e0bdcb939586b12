//! Error types for Study Coach.

use reqwest::StatusCode;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Completion API errors.
///
/// The `Display` output of each variant is what the user sees when a
/// free-form turn fails, so keep the messages readable.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("API error: {status} - {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to read AI reply: {reason}")]
    InvalidResponse { reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_renders_code_and_body() {
        let err = LlmError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: "upstream down".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: 500 Internal Server Error - upstream down"
        );
    }

    #[test]
    fn database_error_converts_into_top_level() {
        let err: Error = DatabaseError::Query("boom".into()).into();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(err.to_string(), "Database error: Query failed: boom");
    }
}
