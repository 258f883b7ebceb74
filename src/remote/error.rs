//! Remote filesystem error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The resume cursor did not land where the caller asked it to.
    #[error("Offset mismatch: requested {requested}, got {actual}")]
    OffsetMismatch { requested: u64, actual: u64 },

    #[error("Session closed")]
    Closed,
}

impl RemoteError {
    /// Whether a failed listing is worth one reconnect-and-retry.
    ///
    /// Lost sessions and garbled server replies are treated alike; a missing
    /// path or a misplaced transfer cursor will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) => true,
            RemoteError::Protocol(_) => true,
            RemoteError::Timeout(_) => true,
            RemoteError::Closed => true,
            RemoteError::Connect(_) => false,
            RemoteError::NotFound(_) => false,
            RemoteError::OffsetMismatch { .. } => false,
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Network(err.to_string())
    }
}

impl From<russh::Error> for RemoteError {
    fn from(err: russh::Error) -> Self {
        RemoteError::Protocol(err.to_string())
    }
}
