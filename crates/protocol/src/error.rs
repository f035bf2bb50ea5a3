//! Protocol error types
//!
//! Errors that can occur when encoding, draining or parsing packets.

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not enough room left in the buffer (or output slice)
    #[error("not enough space: need {needed} bytes, {available} available")]
    NotEnoughSpace { needed: usize, available: usize },

    /// Data source type outside of gauge/derive/counter
    #[error("unknown value type: {0}")]
    UnknownType(u8),

    /// Part header is malformed or runs past the end of the packet
    #[error("invalid part 0x{part_type:04x}: {reason}")]
    InvalidPart { part_type: u16, reason: String },

    /// String part is not NUL terminated UTF-8
    #[error("invalid string in part 0x{0:04x}")]
    InvalidString(u16),

    /// No password is known for the user named in a security envelope
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// HMAC of a signed packet does not match
    #[error("signature mismatch for user {0}")]
    SignatureMismatch(String),

    /// Decrypted payload failed the integrity check
    #[error("decryption failed for user {0}")]
    DecryptionFailed(String),

    /// Envelope could not be produced
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Writing a drained packet to a sink failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Create a not-enough-space error
    #[inline]
    pub fn not_enough_space(needed: usize, available: usize) -> Self {
        Self::NotEnoughSpace { needed, available }
    }

    /// Create an invalid part error
    #[inline]
    pub fn invalid_part(part_type: u16, reason: impl Into<String>) -> Self {
        Self::InvalidPart {
            part_type,
            reason: reason.into(),
        }
    }

    /// Create a crypto error
    #[inline]
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    /// Whether this is [`ProtocolError::NotEnoughSpace`]
    #[inline]
    pub fn is_not_enough_space(&self) -> bool {
        matches!(self, Self::NotEnoughSpace { .. })
    }

    /// Check if this is a recoverable error (drain and retry)
    pub fn is_recoverable(&self) -> bool {
        self.is_not_enough_space()
    }
}
