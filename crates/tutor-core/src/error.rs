use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    /// The stored index was built with a different embedding width than the
    /// runtime backend produces. Requires re-indexing.
    #[error("Embedding dimension mismatch: index has {stored}, backend produces {runtime}")]
    DimensionMismatch { stored: usize, runtime: usize },

    #[error("Index drift detected: {}", .0.join("; "))]
    IndexDrift(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Fatal errors must stop initialization instead of degrading to an
    /// empty retrieval contribution.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DimensionMismatch { .. } | Error::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
