//! Frame header encoding/decoding
//!
//! The frame format uses a 4-byte header:
//! - size: 2 bytes (u16, little-endian, payload length)
//! - command: 1 byte (u8)
//! - seq: 1 byte (u8, wraps modulo 256)

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// Size of the frame header in bytes
pub const HEADER_SIZE: usize = 4;

/// Maximum size of a whole frame (header + payload)
pub const MAX_FRAME_SIZE: usize = 4096;

/// Maximum payload size of a single frame
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// Capacity of the receive buffer owned by a [`Parser`](crate::Parser)
pub const INPUT_BUFFER_SIZE: usize = MAX_FRAME_SIZE * 4;

/// Frame header containing length, command and sequence information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the payload in bytes
    pub size: u16,
    /// Raw command byte
    pub command: u8,
    /// Sender-assigned sequence number
    pub seq: u8,
}

impl FrameHeader {
    /// Create a new frame header
    pub fn new(size: u16, command: u8, seq: u8) -> Self {
        Self { size, command, seq }
    }

    /// Total frame length (header + payload)
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u16_le(self.size);
        dst.put_u8(self.command);
        dst.put_u8(self.seq);
    }

    /// Peek a header at the front of a byte buffer without consuming it
    ///
    /// Returns None if there aren't enough bytes in the buffer.
    /// Returns Err if the declared frame would exceed [`MAX_FRAME_SIZE`].
    pub fn peek(src: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut head = &src[..HEADER_SIZE];
        let header = Self {
            size: head.get_u16_le(),
            command: head.get_u8(),
            seq: head.get_u8(),
        };

        if header.frame_len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::OversizedFrame {
                size: header.frame_len(),
                max: MAX_FRAME_SIZE,
            });
        }

        Ok(Some(header))
    }
}
