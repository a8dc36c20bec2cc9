use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StalkgenError {
    /// Bad caller input, rejected before anything leaves the process.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// The provider answered, but with a structured refusal.
    #[error("Provider rejected request: {message}")]
    ProviderRejected {
        status: Option<u16>,
        code: Option<i64>,
        message: String,
    },

    /// The provider answered with something that is not a usable envelope:
    /// an unparseable body, a non-success `code` on a 2xx, or no `data.status`.
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// No response came back (connect failure, per-call timeout, broken body).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request setup error: {0}")]
    RequestSetup(String),

    #[error("Unrecognized response shape: {0}")]
    UnrecognizedResponseShape(String),

    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("Task {task_id} timed out after {attempts} attempts ({elapsed:?})")]
    Timeout {
        task_id: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StalkgenError {
    pub fn provider_rejected(message: impl Into<String>) -> Self {
        StalkgenError::ProviderRejected {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Whether the poll loop may swallow this error and try again on the
    /// next tick. A structured provider rejection carries a decision, so it
    /// is terminal along with everything that cannot change between attempts.
    pub fn is_retryable_while_polling(&self) -> bool {
        matches!(
            self,
            StalkgenError::Network(_) | StalkgenError::MalformedResponse(_)
        )
    }

    /// Whether a caller retrying the whole request later could plausibly
    /// succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StalkgenError::Network(_) | StalkgenError::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for StalkgenError {
    fn from(err: serde_json::Error) -> Self {
        StalkgenError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StalkgenError>;
