//! Error types for JSONP execution.

use thiserror::Error;

/// Errors that can occur while executing a JSONP result.
#[derive(Debug, Error)]
pub enum JsonpError {
    /// A precondition failed. Raised before any header mutation or body write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The value could not be represented as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The output stream rejected a write or flush.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),

    /// Options failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl JsonpError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns `true` when no bytes can have reached the body.
    pub fn is_pre_write(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::Config(_))
    }
}

impl From<serde_json::Error> for JsonpError {
    /// `serde_json` reports sink failures as I/O errors; those are transport
    /// failures, not problems with the value.
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Transport(err.into())
        } else {
            Self::Serialization(err)
        }
    }
}
