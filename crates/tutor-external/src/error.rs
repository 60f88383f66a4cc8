use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExternalError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Gave up after {0} attempts")]
    RetriesExhausted(u32),

    /// Wikimedia policy: the agent must name the project and carry a contact
    /// email (https://meta.wikimedia.org/wiki/User-Agent_policy).
    #[error("User-Agent must include project name, URL and contact email, got {0:?}")]
    InvalidUserAgent(String),

    #[error("Action '{0}' not allowed")]
    ActionNotAllowed(String),

    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Outcome of a call routed through a `CircuitBreaker`.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit is open")]
    Open,

    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool { matches!(self, BreakerError::Open) }
}
