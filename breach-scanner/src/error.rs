use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        ScanError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    /// True for failures of a single request, as opposed to misconfiguration.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScanError::Transport { .. } | ScanError::HttpError(_))
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
