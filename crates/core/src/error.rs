//! Error taxonomy shared by the query layer and the tool surface.

use serde::{Deserialize, Serialize};

/// Result type for news operations.
pub type NewsResult<T> = Result<T, NewsError>;

/// Errors that can occur while answering a news query.
#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    /// Caller supplied bad, missing or mistyped parameters.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The upstream could not be reached (DNS, connect, timeout).
    #[error("Upstream unavailable: {0}")]
    RemoteUnavailable(String),

    /// The upstream answered with a non-success status.
    #[error("Upstream rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// The page was fetched but no article body could be found.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// No Guardian API key is configured.
    #[error("GUARDIAN_API_KEY is not set")]
    MissingApiKey,

    /// The upstream answered 2xx with a payload we could not interpret.
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl NewsError {
    /// Stable tag identifying the error kind on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::MissingApiKey => "missing_api_key",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build a rejection from a status code and the raw response body.
    ///
    /// The Guardian wraps errors as `{"response": {"status": "error", "message": ...}}`,
    /// other hosts sometimes answer `{"message": ...}`. Anything else is
    /// reported as a truncated body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(ErrorEnvelope {
                response: Some(ErrorBody { message: Some(m) }),
                ..
            }) => m,
            Ok(ErrorEnvelope {
                message: Some(m), ..
            }) => m,
            _ => truncate(body.trim(), MAX_BODY_IN_MESSAGE),
        };

        Self::RemoteRejected { status, message }
    }

    /// Serializable view used by the tool surface.
    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<reqwest::Error> for NewsError {
    /// The request URL is dropped from the message; it carries the API key.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        match err.status() {
            Some(status) => Self::RemoteRejected {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None if err.is_timeout() => Self::RemoteUnavailable(format!("request timed out: {}", err)),
            None => Self::RemoteUnavailable(err.to_string()),
        }
    }
}

const MAX_BODY_IN_MESSAGE: usize = 200;

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    response: Option<ErrorBody>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Error body returned to tool callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}
