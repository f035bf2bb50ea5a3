//! Error types for the UDP client

use cdnet_protocol::{ProtocolError, SecurityLevel};
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when connecting, writing or flushing
#[derive(Debug, Error)]
pub enum ClientError {
    /// Encoding or envelope failure
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signing or encryption requested without username and password
    #[error("security level {0} requires a username and password")]
    MissingCredentials(SecurityLevel),

    /// Server address could not be resolved
    #[error("invalid server address: {0}")]
    InvalidAddress(String),
}

impl ClientError {
    /// Check if this error came from a full buffer
    pub fn is_not_enough_space(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_not_enough_space())
    }
}
