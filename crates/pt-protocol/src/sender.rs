//! Frame sender
//!
//! Builds one frame at a time into a reusable buffer and writes the whole
//! frame before returning. Partial and interrupted writes are resumed; a
//! writer that stops accepting bytes mid-frame is a fatal short write.

use std::io::Write;

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::FrameCodec;
use crate::error::ProtocolError;
use crate::frame::{HEADER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
use crate::message::{Command, Message, WindowSize};
use crate::transport::write_fully;

/// Send side of one direction of a session
#[derive(Debug)]
pub struct FrameSender<W> {
    writer: W,
    codec: FrameCodec,
    buf: BytesMut,
}

impl<W: Write> FrameSender<W> {
    /// Create a sender whose sequence counter starts at zero
    pub fn new(writer: W) -> Self {
        Self::with_codec(writer, FrameCodec::new())
    }

    /// Create a sender around an existing codec
    pub fn with_codec(writer: W, codec: FrameCodec) -> Self {
        Self {
            writer,
            codec,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Sequence number the next frame will carry
    pub fn next_seq(&self) -> u8 {
        self.codec.next_send_seq()
    }

    /// Send a message as one frame
    pub fn send(&mut self, message: Message) -> Result<(), ProtocolError> {
        self.buf.clear();
        let command = message.command();
        self.codec.encode(message, &mut self.buf)?;
        self.flush_frame(command)
    }

    /// Send a DATA frame
    pub fn send_data(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        self.send_payload(Command::Data, payload)
    }

    /// Send an ERR frame
    pub fn send_stderr(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        self.send_payload(Command::Stderr, payload)
    }

    /// Send a WS frame
    pub fn send_window_size(&mut self, size: WindowSize) -> Result<(), ProtocolError> {
        self.send(Message::WindowSize(size))
    }

    /// Send an EOF frame
    pub fn send_eof(&mut self) -> Result<(), ProtocolError> {
        self.send(Message::Eof)
    }

    /// Send a frame with an arbitrary command and payload
    pub fn send_payload(&mut self, command: Command, payload: &[u8]) -> Result<(), ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        self.buf.clear();
        self.codec.encode_raw(command, payload, &mut self.buf)?;
        self.flush_frame(command)
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn flush_frame(&mut self, command: Command) -> Result<(), ProtocolError> {
        let expected = self.buf.len();
        write_fully(&mut self.writer, &self.buf)?;
        self.writer.flush()?;

        tracing::debug!(
            "Sent frame [size:{}][cmd:{}][seq:{}]",
            expected - HEADER_SIZE,
            command.name(),
            self.codec.next_send_seq().wrapping_sub(1)
        );
        Ok(())
    }
}
