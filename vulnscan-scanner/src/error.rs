use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid worker count {0}: must be between 1 and {max}", max = crate::dispatch::MAX_WORKERS)]
    InvalidWorkerCount(usize),

    #[error("External tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// True when the underlying HTTP failure was the client-side timeout firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::HttpError(e) if e.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
