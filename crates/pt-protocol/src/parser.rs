//! Incremental frame parser over a byte stream
//!
//! The parser owns a fixed-capacity receive buffer. Each call to
//! [`Parser::feed`] performs one read from the underlying stream, extracts
//! every complete frame now present, and keeps any trailing partial frame
//! at the front of the buffer so the next read appends after it. Frames may
//! therefore straddle read boundaries arbitrarily.

use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::FrameCodec;
use crate::error::ProtocolError;
use crate::frame::INPUT_BUFFER_SIZE;
use crate::message::Message;

/// What the parser should do after a message callback returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep extracting frames
    Continue,
    /// Stop extracting; remaining bytes stay buffered
    Stop,
}

/// Receive-side frame parser for one direction of a session
#[derive(Debug)]
pub struct Parser {
    buf: BytesMut,
    capacity: usize,
    codec: FrameCodec,
    eof: bool,
}

impl Parser {
    /// Create a parser with the default receive buffer capacity
    pub fn new() -> Self {
        Self::with_codec(FrameCodec::new())
    }

    /// Create a parser around an existing codec
    pub fn with_codec(codec: FrameCodec) -> Self {
        Self {
            buf: BytesMut::with_capacity(INPUT_BUFFER_SIZE),
            capacity: INPUT_BUFFER_SIZE,
            codec,
            eof: false,
        }
    }

    /// Whether the underlying stream has reached end of input
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Number of buffered bytes not yet consumed as frames
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The codec tracking the expected receive sequence
    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Read once from `reader` and hand every complete frame to `on_message`.
    ///
    /// Returns the number of messages delivered. A zero-byte read marks end
    /// of stream and delivers nothing. Errors from the callback abort the
    /// scan and are returned unchanged.
    pub fn feed<R, F>(&mut self, reader: &mut R, mut on_message: F) -> Result<usize, ProtocolError>
    where
        R: Read + ?Sized,
        F: FnMut(Message) -> Result<Flow, ProtocolError>,
    {
        if self.eof {
            return Ok(0);
        }

        let filled = self.buf.len();
        if filled >= self.capacity {
            return Err(ProtocolError::BufferExhausted {
                capacity: self.capacity,
            });
        }

        self.buf.resize(self.capacity, 0);
        let nread = loop {
            match reader.read(&mut self.buf[filled..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(filled);
                    return Err(e.into());
                }
            }
        };
        self.buf.truncate(filled + nread);

        if nread == 0 {
            tracing::debug!("Parser reached end of stream");
            self.eof = true;
            return match self.codec.decode_eof(&mut self.buf)? {
                // A complete frame would have been extracted on the previous call
                Some(message) => Err(ProtocolError::MalformedPayload {
                    command: message.command().name(),
                    reason: "frame left unconsumed at end of stream".to_string(),
                }),
                None => Ok(0),
            };
        }

        let mut delivered = 0;
        while let Some(message) = self.codec.decode(&mut self.buf)? {
            delivered += 1;
            if on_message(message)? == Flow::Stop {
                return Ok(delivered);
            }
        }

        if delivered == 0 && self.buf.len() >= self.capacity {
            return Err(ProtocolError::BufferExhausted {
                capacity: self.capacity,
            });
        }

        if !self.buf.is_empty() {
            tracing::debug!("Parser holding {} bytes of a partial frame", self.buf.len());
        }
        Ok(delivered)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
