//! Message types for the pty-tunnel protocol
//!
//! A frame carries one of a small fixed set of commands. The payload of a
//! frame is interpreted according to its command and surfaced as a
//! [`Message`] variant.
//!
//! # Message Flow
//!
//! Typical message sequence for a session:
//!
//! 1. Front sends `WindowSize` with the current terminal dimensions
//! 2. Keystrokes: `Data` from front to host
//! 3. Program output: `Data` (and `Stderr` in pipe mode) from host to front
//! 4. Window resize: `WindowSize` from front whenever the terminal changes
//! 5. End of input: `Eof` from the side whose local source ran dry

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Terminal dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of rows
    pub rows: u16,
    /// Number of columns
    pub cols: u16,
}

impl WindowSize {
    /// Encoded size of a window size payload
    pub const PAYLOAD_LEN: usize = 4;

    /// Create a new window size
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    /// Encode as `row(u16 LE), col(u16 LE)`
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(Self::PAYLOAD_LEN);
        dst.put_u16_le(self.rows);
        dst.put_u16_le(self.cols);
    }

    /// Decode from a payload that must be exactly 4 bytes
    pub fn decode(mut payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() != Self::PAYLOAD_LEN {
            return Err(ProtocolError::MalformedPayload {
                command: "WS",
                reason: format!("expected 4 bytes, got {}", payload.len()),
            });
        }
        let rows = payload.get_u16_le();
        let cols = payload.get_u16_le();
        Ok(Self { rows, cols })
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Command identifier carried in the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    /// Terminal data (keystrokes or program output)
    Data = 0,
    /// Window size change
    WindowSize = 1,
    /// End of input on the sending side
    Eof = 2,
    /// Secondary output channel (child stderr in pipe mode)
    Stderr = 3,
}

impl Command {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::WindowSize),
            2 => Some(Self::Eof),
            3 => Some(Self::Stderr),
            _ => None,
        }
    }

    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data => "DATA",
            Self::WindowSize => "WS",
            Self::Eof => "EOF",
            Self::Stderr => "ERR",
        }
    }
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Terminal data
    Data(Bytes),

    /// Window resize
    WindowSize(WindowSize),

    /// End of input
    Eof,

    /// Secondary output channel data
    Stderr(Bytes),
}

impl Message {
    /// Get the command for this message
    pub fn command(&self) -> Command {
        match self {
            Message::Data(_) => Command::Data,
            Message::WindowSize(_) => Command::WindowSize,
            Message::Eof => Command::Eof,
            Message::Stderr(_) => Command::Stderr,
        }
    }

    /// Build a message from its command byte and payload
    pub fn from_parts(command: u8, payload: Bytes) -> Result<Self, ProtocolError> {
        let command = Command::from_u8(command).ok_or(ProtocolError::UnknownCommand(command))?;
        match command {
            Command::Data => Ok(Message::Data(payload)),
            Command::Stderr => Ok(Message::Stderr(payload)),
            Command::WindowSize => Ok(Message::WindowSize(WindowSize::decode(&payload)?)),
            Command::Eof if payload.is_empty() => Ok(Message::Eof),
            Command::Eof => Err(ProtocolError::MalformedPayload {
                command: command.name(),
                reason: format!("unexpected {} byte payload", payload.len()),
            }),
        }
    }

    /// Length of the encoded payload
    pub fn payload_len(&self) -> usize {
        match self {
            Message::Data(data) | Message::Stderr(data) => data.len(),
            Message::WindowSize(_) => WindowSize::PAYLOAD_LEN,
            Message::Eof => 0,
        }
    }

    /// Append the encoded payload to a buffer
    pub fn encode_payload(&self, dst: &mut BytesMut) {
        match self {
            Message::Data(data) | Message::Stderr(data) => dst.extend_from_slice(data),
            Message::WindowSize(ws) => ws.encode(dst),
            Message::Eof => {}
        }
    }
}
