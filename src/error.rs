use thiserror::Error;

/// Request-scoped failures of a chat turn or a backend call.
///
/// Nothing here is process-fatal: the HTTP layer maps every variant to a
/// response and keeps serving.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Message is required")]
    EmptyMessage,

    #[error("backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    BackendStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed backend response: {0}")]
    BackendPayload(String),
}

impl ProxyError {
    /// True when the failure came from the completion backend rather than the caller.
    pub fn is_backend(&self) -> bool {
        !matches!(self, ProxyError::EmptyMessage)
    }
}
