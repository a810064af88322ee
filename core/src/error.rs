//! Error types for the targets API client.
//!
//! # Design
//! A single tagged enum covers every way an operation can fail. The four
//! protocol-level kinds let callers tell apart "the server told us what went
//! wrong" (`Service`), "the server failed without a structured body"
//! (`General`), "we could not talk to the server" (`Transport`) and "the
//! server's JSON was unparsable" (`MalformedBody`). The remaining variants
//! cover local failures around those exchanges.

use std::time::Duration;

/// Boxed cause of a transport-level failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the executor, the poller and the endpoint facade.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a JSON error body. Fields the body did not
    /// provide are `None`.
    #[error(
        "{} ({}): {}",
        .reason.as_deref().unwrap_or("UNKNOWN"),
        .code.map_or_else(|| "-".to_string(), |c| c.to_string()),
        .message.as_deref().unwrap_or("")
    )]
    Service {
        message: Option<String>,
        code: Option<i64>,
        reason: Option<String>,
    },

    /// The server answered with a failure status and a non-JSON body.
    #[error("({code}): {message}")]
    General { message: String, code: u16 },

    /// The request never produced a status code, or the body stream broke.
    #[error("transport error: {cause}")]
    Transport {
        #[source]
        cause: BoxError,
    },

    /// The body was announced as JSON but could not be parsed.
    #[error("{raw_body}")]
    MalformedBody { raw_body: String },

    /// A request payload could not be encoded as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The JSON body did not have the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A long-running operation was accepted without a status location.
    #[error("accepted response (status {status}) has no Location header")]
    MissingLocation { status: u16 },

    /// The poll loop hit its configured bound before the operation completed.
    #[error("operation at {location} not completed after {attempts} polls ({elapsed:?})")]
    PollLimitExceeded {
        location: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// The caller cancelled the operation at a suspension point.
    #[error("operation cancelled")]
    Cancelled,

    /// A request could not be built as asked, e.g. a body on a GET.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    pub fn transport(cause: impl Into<BoxError>) -> Self {
        ApiError::Transport { cause: cause.into() }
    }

    /// HTTP status associated with the error, when one was observed.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::General { code, .. } => Some(*code),
            ApiError::Service { code, .. } => code.and_then(|c| u16::try_from(c).ok()),
            _ => None,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, ApiError::Service { .. })
    }

    /// Machine-readable reason from a service error body.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ApiError::Service { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::transport(error)
    }
}
