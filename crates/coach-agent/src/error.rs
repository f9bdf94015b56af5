use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("function '{action}' failed: {message}")]
    Function { action: String, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl AgentError {
    /// Timeouts, connection failures and 5xx responses are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Http(e) => e.is_timeout() || e.is_connect(),
            AgentError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
