//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Unknown command byte in a frame header
    #[error("Unknown command: {0}")]
    UnknownCommand(u8),

    /// A known command that this endpoint does not accept
    #[error("Unexpected command: {0}")]
    UnexpectedCommand(&'static str),

    /// Declared frame size exceeds the maximum frame size
    #[error("Oversized frame: {size} bytes exceeds maximum of {max} bytes")]
    OversizedFrame { size: usize, max: usize },

    /// Outgoing payload exceeds the maximum payload size
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Frame sequence number does not match the expected value
    #[error("Sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u8, actual: u8 },

    /// Payload does not have the shape its command requires
    #[error("Malformed {command} payload: {reason}")]
    MalformedPayload {
        command: &'static str,
        reason: String,
    },

    /// Stream ended in the middle of a frame
    #[error("Truncated frame: {pending} bytes left at end of stream")]
    TruncatedFrame { pending: usize },

    /// Receive buffer is full but holds no complete frame
    #[error("Receive buffer exhausted: {capacity} bytes without a complete frame")]
    BufferExhausted { capacity: usize },

    /// Underlying writer accepted fewer bytes than requested
    #[error("Short write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced while decoding the text-safe transport encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextSafeError {
    /// Padding character in the first or second position of a unit
    #[error("Unexpected padding at unit position {position}")]
    InvalidPadding { position: usize },

    /// A four-character unit that does not decode
    #[error("Invalid encoded unit: {0}")]
    InvalidUnit(String),

    /// Output buffer cannot hold the encoded block
    #[error("Encode buffer too small: need {needed} bytes, have {available}")]
    OutputTooSmall { needed: usize, available: usize },

    /// Input ended with an incomplete unit
    #[error("Truncated encoded unit: {pending} characters left at end of input")]
    TruncatedUnit { pending: usize },
}

impl From<TextSafeError> for std::io::Error {
    fn from(err: TextSafeError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}
