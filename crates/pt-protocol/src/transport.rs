//! Byte-stream transport with optional text-safe encoding
//!
//! A [`Transport`] pairs a read side and a write side. Both halves present
//! plain [`Read`]/[`Write`] semantics whether or not encoding is active, so
//! the framing layer above never knows which one it is talking to. The
//! halves are split apart with [`Transport::into_split`] and handed to the
//! pump direction that uses them.

use std::io::{self, ErrorKind, Read, Write};

use bytes::{Buf, BytesMut};

use crate::error::{ProtocolError, TextSafeError};
use crate::frame::MAX_FRAME_SIZE;
use crate::textsafe;

/// Capacity of the encoded residual buffer on the read side
pub const RESIDUAL_BUFFER_SIZE: usize = MAX_FRAME_SIZE * 6;

/// Largest plaintext block encoded per underlying write (a multiple of 3)
pub const ENCODE_BLOCK_SIZE: usize = MAX_FRAME_SIZE * 4 - 1;

/// Encoding applied on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// Bytes pass through unchanged
    #[default]
    Raw,
    /// Standard base64 with padding
    Base64,
}

impl Encoding {
    /// Pick an encoding from a boolean flag
    pub fn from_flag(base64: bool) -> Self {
        if base64 {
            Self::Base64
        } else {
            Self::Raw
        }
    }
}

/// Read and write halves of one transport
#[derive(Debug)]
pub struct Transport<R, W> {
    reader: TransportReader<R>,
    writer: TransportWriter<W>,
}

impl<R: Read, W: Write> Transport<R, W> {
    /// Create a transport over a reader and a writer
    pub fn new(reader: R, writer: W, encoding: Encoding) -> Self {
        Self {
            reader: TransportReader::new(reader, encoding),
            writer: TransportWriter::new(writer, encoding),
        }
    }

    /// Split into independently owned halves
    pub fn into_split(self) -> (TransportReader<R>, TransportWriter<W>) {
        (self.reader, self.writer)
    }
}

impl<R: Read, W> Read for Transport<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R, W: Write> Write for Transport<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Read half of a transport
#[derive(Debug)]
pub struct TransportReader<R> {
    inner: R,
    decoder: Option<DecodeState>,
}

#[derive(Debug)]
struct DecodeState {
    /// Encoded bytes not yet resolved into plaintext
    residual: BytesMut,
    /// Plaintext decoded but not yet delivered to a too-small caller buffer
    carry: BytesMut,
}

impl<R: Read> TransportReader<R> {
    /// Wrap a reader
    pub fn new(inner: R, encoding: Encoding) -> Self {
        let decoder = match encoding {
            Encoding::Raw => None,
            Encoding::Base64 => Some(DecodeState {
                residual: BytesMut::with_capacity(RESIDUAL_BUFFER_SIZE),
                carry: BytesMut::with_capacity(textsafe::UNIT_PLAIN_LEN),
            }),
        };
        Self { inner, decoder }
    }

    /// Encoded bytes currently held in the residual buffer
    pub fn residual_len(&self) -> usize {
        self.decoder.as_ref().map_or(0, |d| d.residual.len())
    }

    /// Unwrap the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for TransportReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let Self { inner, decoder } = self;
        match decoder {
            None => read_retrying(inner, buf),
            Some(state) => state.read(inner, buf),
        }
    }
}

impl DecodeState {
    fn read<R: Read>(&mut self, inner: &mut R, buf: &mut [u8]) -> io::Result<usize> {
        if !self.carry.is_empty() {
            let n = self.carry.len().min(buf.len());
            buf[..n].copy_from_slice(&self.carry[..n]);
            self.carry.advance(n);
            return Ok(n);
        }

        if buf.len() < textsafe::UNIT_PLAIN_LEN {
            let mut unit = [0u8; textsafe::UNIT_PLAIN_LEN];
            let decoded = self.read_units(inner, &mut unit)?;
            let n = decoded.min(buf.len());
            buf[..n].copy_from_slice(&unit[..n]);
            self.carry.extend_from_slice(&unit[n..decoded]);
            return Ok(n);
        }

        self.read_units(inner, buf)
    }

    /// Decode into `out` (at least one unit long), reading more raw bytes as
    /// needed. Returns 0 only at raw end of input.
    fn read_units<R: Read>(&mut self, inner: &mut R, out: &mut [u8]) -> io::Result<usize> {
        loop {
            let progress = textsafe::decode(&self.residual, out)?;
            self.residual.advance(progress.consumed);
            self.compact();
            if progress.written > 0 {
                return Ok(progress.written);
            }

            let room = RESIDUAL_BUFFER_SIZE.saturating_sub(self.residual.len());
            let limit = room.min(textsafe::encoded_len(out.len()));
            if limit == 0 {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    ProtocolError::BufferExhausted {
                        capacity: RESIDUAL_BUFFER_SIZE,
                    },
                ));
            }

            let filled = self.residual.len();
            self.residual.resize(filled + limit, 0);
            let raw = match read_retrying(inner, &mut self.residual[filled..]) {
                Ok(n) => n,
                Err(e) => {
                    self.residual.truncate(filled);
                    return Err(e);
                }
            };
            self.residual.truncate(filled + raw);

            if raw == 0 {
                if self.residual.is_empty() {
                    return Ok(0);
                }
                return Err(TextSafeError::TruncatedUnit {
                    pending: self.residual.len(),
                }
                .into());
            }
        }
    }

    /// Drop noise bytes so only significant characters stay buffered
    fn compact(&mut self) {
        let mut kept = 0;
        for i in 0..self.residual.len() {
            let byte = self.residual[i];
            if textsafe::is_significant(byte) {
                self.residual[kept] = byte;
                kept += 1;
            }
        }
        self.residual.truncate(kept);
    }
}

/// Write half of a transport
#[derive(Debug)]
pub struct TransportWriter<W> {
    inner: W,
    staging: Option<Vec<u8>>,
}

impl<W: Write> TransportWriter<W> {
    /// Wrap a writer
    pub fn new(inner: W, encoding: Encoding) -> Self {
        let staging = match encoding {
            Encoding::Raw => None,
            Encoding::Base64 => Some(vec![0u8; textsafe::encoded_len(ENCODE_BLOCK_SIZE)]),
        };
        Self { inner, staging }
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TransportWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Self { inner, staging } = self;
        let Some(staging) = staging else {
            write_fully(inner, buf)?;
            return Ok(buf.len());
        };

        for block in buf.chunks(ENCODE_BLOCK_SIZE) {
            let encoded = textsafe::encode(block, staging)?;
            if let Err(e) = write_fully(inner, &staging[..encoded]) {
                tracing::error!("Write on encoded transport failed [encoded:{}]: {}", encoded, e);
                return Err(e);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        loop {
            match self.inner.flush() {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// Write all of `buf`, resuming after partial writes and interrupts.
///
/// A writer that stops accepting bytes is reported as a short write.
pub fn write_fully<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]) {
            Ok(0) => return Err(short_write(written, buf.len())),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Build the error reported when a writer stops accepting bytes
pub fn short_write(written: usize, expected: usize) -> io::Error {
    io::Error::new(
        ErrorKind::WriteZero,
        ProtocolError::ShortWrite { written, expected },
    )
}

fn read_retrying<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
