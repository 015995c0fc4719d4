use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::I18n;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Not allowed to access {entity} {id}")]
    Forbidden { entity: &'static str, id: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Upload {upload_id} has already been processed")]
    AlreadyProcessed { upload_id: String },

    /// Display form is what gets persisted as the upload's last error
    #[error("extraction failed: {detail}")]
    ExtractionFailed { upload_id: String, detail: String },

    #[error("summarization failed: {detail}")]
    SummarizationFailed { upload_id: String, detail: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Speech(#[from] SpeechError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Text-completion (LLM) client errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Connection failed to LLM endpoint at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Generation failed (status {status}): {message}")]
    Generation { status: u16, message: String },

    #[error("Invalid response from LLM endpoint")]
    InvalidResponse {
        #[source]
        source: reqwest::Error,
    },

    #[error("No {what} generated")]
    EmptyCompletion { what: &'static str },
}

/// Speech synthesis client errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech synthesis is not configured")]
    NotConfigured,

    #[error("Connection failed to speech endpoint at {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Speech synthesis failed (status {status}): {message}")]
    Synthesis { status: u16, message: String },
}

/// Content extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unsupported origin: {origin}")]
    InvalidOrigin { origin: String },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("source is too large: {size} bytes (max {max} bytes)")]
    SourceTooLarge { size: u64, max: u64 },

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("failed to parse PDF: {0}")]
    Pdf(#[source] lopdf::Error),

    #[error("unsupported document format")]
    UnsupportedFormat,

    #[error("transcription failed (status {status}): {message}")]
    Transcription { status: u16, message: String },

    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },

    #[error("invalid video URL: {url}")]
    InvalidVideoUrl { url: String },

    #[error("could not extract meaningful content from web page")]
    NoMeaningfulContent,

    #[error("no extractor registered for {kind}")]
    NoExtractor { kind: String },

    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Object storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid storage key: {key}")]
    InvalidKey { key: String },

    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn forbidden(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::Forbidden {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ServiceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            ServiceError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
            ServiceError::ExtractionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::SummarizationFailed { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Llm(LlmError::ModelNotFound { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Llm(_) | ServiceError::Speech(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound { .. } => "not_found",
            ServiceError::Forbidden { .. } => "forbidden",
            ServiceError::Unauthorized { .. } => "unauthorized",
            ServiceError::InvalidInput { .. } => "invalid_input",
            ServiceError::AlreadyProcessed { .. } => "already_processed",
            ServiceError::ExtractionFailed { .. } => "extraction_failed",
            ServiceError::SummarizationFailed { .. } => "summarization_failed",
            ServiceError::ServiceUnavailable { .. } => "service_unavailable",
            ServiceError::Llm(LlmError::Connection { .. }) => "llm_connection",
            ServiceError::Llm(LlmError::ModelNotFound { .. }) => "llm_model_not_found",
            ServiceError::Llm(LlmError::Generation { .. }) => "llm_generation",
            ServiceError::Llm(LlmError::InvalidResponse { .. }) => "llm_invalid_response",
            ServiceError::Llm(LlmError::EmptyCompletion { .. }) => "llm_empty_completion",
            ServiceError::Speech(SpeechError::NotConfigured) => "speech_not_configured",
            ServiceError::Speech(_) => "speech_error",
            ServiceError::Storage(StorageError::NotFound { .. }) => "object_not_found",
            ServiceError::Storage(_) => "storage_error",
            ServiceError::Database(_) => "database_error",
            ServiceError::Config { .. } => "config_error",
            ServiceError::Internal { .. } => "internal_error",
        }
    }

    /// Get a user-friendly translated message
    pub fn user_message(&self, i18n: &I18n, locale: &str) -> String {
        match self {
            ServiceError::NotFound { entity, id } => i18n.format(
                locale,
                "error-not-found",
                &[("entity", *entity), ("id", id.as_str())],
            ),
            ServiceError::Forbidden { entity, .. } => {
                i18n.format(locale, "error-forbidden", &[("entity", *entity)])
            }
            ServiceError::AlreadyProcessed { upload_id } => {
                i18n.format(locale, "error-already-processed", &[("id", upload_id.as_str())])
            }
            ServiceError::Database(_) | ServiceError::Internal { .. } => {
                i18n.get(locale, "error-internal", None)
            }
            // For other errors, fall back to the technical message
            _ => self.to_string(),
        }
    }

    /// Convert to an error response with i18n support
    pub fn into_response_with_i18n(self, i18n: &I18n, locale: &str) -> Response {
        let status = self.status_code();
        let response = ErrorResponse {
            message: self.user_message(i18n, locale),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let response = ErrorResponse {
            message: self.to_string(),
            code: Some(self.error_code().to_string()),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error wrapper with i18n support for API responses
pub struct I18nError {
    pub error: ServiceError,
    pub i18n: std::sync::Arc<I18n>,
    pub locale: String,
}

impl I18nError {
    pub fn new(error: ServiceError, i18n: std::sync::Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            error,
            i18n,
            locale: locale.into(),
        }
    }
}

impl IntoResponse for I18nError {
    fn into_response(self) -> Response {
        self.error.into_response_with_i18n(&self.i18n, &self.locale)
    }
}

/// Flatten an error and its sources into one line
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            ServiceError::not_found("upload", "u1").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::forbidden("upload", "u1").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::AlreadyProcessed {
                upload_id: "u1".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::ServiceUnavailable {
                message: "video".to_string()
            }
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_stage_failures_display_with_stage_prefix() {
        let extraction = ServiceError::ExtractionFailed {
            upload_id: "u1".to_string(),
            detail: "no extractable content".to_string(),
        };
        assert_eq!(
            extraction.to_string(),
            "extraction failed: no extractable content"
        );

        let summarization = ServiceError::SummarizationFailed {
            upload_id: "u1".to_string(),
            detail: "No summary generated".to_string(),
        };
        assert_eq!(
            summarization.to_string(),
            "summarization failed: No summary generated"
        );
    }

    #[test]
    fn test_format_error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err = ExtractionError::Storage(StorageError::Io(io));
        let formatted = format_error_chain(&err);
        assert!(formatted.contains("missing file"));
    }
}
