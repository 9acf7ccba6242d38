use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlgoError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid attempt record #{index}: {reason}")]
    InvalidAttemptRecord { index: usize, reason: String },
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("config decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AlgoError>;
