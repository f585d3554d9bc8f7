//! Error types for dlkit core

use dlkit_types::ErrorKind;
use thiserror::Error;

/// Errors that can occur in dlkit core
#[derive(Debug, Error)]
pub enum DlkitError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DlkitError {
    /// Map this error onto the public failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            DlkitError::Timeout(_) => ErrorKind::Timeout,
            DlkitError::Network(e) => classify_reqwest(e),
            DlkitError::ServerError { .. } => ErrorKind::Server,
            DlkitError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            DlkitError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            DlkitError::Io(_) => ErrorKind::Storage,
            DlkitError::InvalidOperation(_)
            | DlkitError::Serialization(_)
            | DlkitError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

fn classify_reqwest(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        ErrorKind::Timeout
    } else if e.is_status() {
        ErrorKind::Server
    } else if e.is_builder() {
        // Builder errors are raised for URLs reqwest refuses to send to
        ErrorKind::InvalidUrl
    } else {
        ErrorKind::Network
    }
}

impl From<serde_json::Error> for DlkitError {
    fn from(error: serde_json::Error) -> Self {
        DlkitError::Serialization(error.to_string())
    }
}

impl From<url::ParseError> for DlkitError {
    fn from(error: url::ParseError) -> Self {
        DlkitError::InvalidUrl(error.to_string())
    }
}
