//! Network error types

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// How the caller should surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retryable fetch or connection failure
    Transport,
    /// Malformed data from the backend
    DataIntegrity,
    /// Backend refused the operation (duplicate vote, inactive voting, ...)
    BusinessRule,
    /// Missing or expired token
    Auth,
}

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Session expired")]
    SessionExpired,

    #[error("{0}")]
    Rejected(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection closed")]
    ConnectionClosed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) | Error::Http { .. } | Error::ConnectionClosed => {
                ErrorKind::Transport
            }
            Error::SessionExpired => ErrorKind::Auth,
            Error::Rejected(_) => ErrorKind::BusinessRule,
            Error::Protocol(_) | Error::Config(_) => ErrorKind::DataIntegrity,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::ConnectionClosed => true,
            Error::Http { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Protocol(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Protocol(format!("Invalid JSON: {}", value))
    }
}

impl From<asamblea_core::Error> for Error {
    fn from(value: asamblea_core::Error) -> Self {
        Self::Config(value.to_string())
    }
}
