//! Tokio codec for framed protocol messages
//!
//! The codec owns both sequence counters of one endpoint: the counter
//! assigned to outgoing frames and the counter expected on incoming ones.
//! Each pump direction owns its own codec, so no counter is ever shared.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::message::{Command, Message};

/// Codec for encoding/decoding protocol frames
#[derive(Debug, Default)]
pub struct FrameCodec {
    /// Sequence number assigned to the next outgoing frame
    send_seq: u8,
    /// Sequence number expected on the next incoming frame
    recv_seq: u8,
}

impl FrameCodec {
    /// Create a new codec with both counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn with_sequence(send_seq: u8, recv_seq: u8) -> Self {
        Self { send_seq, recv_seq }
    }

    /// Sequence number the next outgoing frame will carry
    pub fn next_send_seq(&self) -> u8 {
        self.send_seq
    }

    /// Sequence number the next incoming frame must carry
    pub fn expected_recv_seq(&self) -> u8 {
        self.recv_seq
    }

    /// Encode a frame from a command and a raw payload
    pub fn encode_raw(
        &mut self,
        command: Command,
        payload: &[u8],
        dst: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        self.put_header(command, payload.len(), dst)?;
        dst.extend_from_slice(payload);
        Ok(())
    }

    fn put_header(
        &mut self,
        command: Command,
        payload_len: usize,
        dst: &mut BytesMut,
    ) -> Result<(), ProtocolError> {
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        // payload_len <= MAX_PAYLOAD_SIZE < u16::MAX
        let header = FrameHeader::new(payload_len as u16, command.as_u8(), self.send_seq);
        dst.reserve(header.frame_len());
        header.encode(dst);
        self.send_seq = self.send_seq.wrapping_add(1);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match FrameHeader::peek(src)? {
            Some(h) => h,
            None => return Ok(None), // Need more data
        };

        // Wait for the whole payload before consuming anything
        if src.len() < header.frame_len() {
            return Ok(None);
        }

        if header.seq != self.recv_seq {
            return Err(ProtocolError::SequenceMismatch {
                expected: self.recv_seq,
                actual: header.seq,
            });
        }
        self.recv_seq = self.recv_seq.wrapping_add(1);

        let mut frame = src.split_to(header.frame_len());
        frame.advance(HEADER_SIZE);

        tracing::debug!(
            "Decoded frame [size:{}][cmd:{}][seq:{}]",
            header.size,
            header.command,
            header.seq
        );

        Message::from_parts(header.command, frame.freeze()).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(ProtocolError::TruncatedFrame { pending: src.len() }),
        }
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.put_header(message.command(), message.payload_len(), dst)?;
        message.encode_payload(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WindowSize;
    use bytes::Bytes;

    #[test]
    fn test_encode_data_frame_bytes() {
        let mut codec = FrameCodec::with_sequence(5, 5);

        let mut buf = BytesMut::new();
        codec
            .encode(Message::Data(Bytes::from_static(b"hi")), &mut buf)
            .unwrap();

        assert_eq!(&buf[..], &[0x02, 0x00, 0x00, 0x05, 0x68, 0x69]);
        assert_eq!(codec.next_send_seq(), 6);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::Data(Bytes::from_static(b"hi")));
        assert_eq!(codec.expected_recv_seq(), 6);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_window_size_message() {
        let mut codec = FrameCodec::new();

        let mut buf = BytesMut::new();
        codec
            .encode(Message::WindowSize(WindowSize::new(24, 80)), &mut buf)
            .unwrap();
        assert_eq!(&buf[HEADER_SIZE..], &[0x18, 0x00, 0x50, 0x00]);

        match codec.decode(&mut buf).unwrap().unwrap() {
            Message::WindowSize(ws) => {
                assert_eq!(ws.rows, 24);
                assert_eq!(ws.cols, 80);
            }
            other => panic!("Expected WindowSize message, got {:?}", other),
        }
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = FrameCodec::new();

        let mut full_buf = BytesMut::new();
        codec
            .encode(Message::Data(Bytes::from_static(b"Hello")), &mut full_buf)
            .unwrap();

        // Split the buffer to simulate partial read
        let mut partial = full_buf.split_to(HEADER_SIZE + 2);

        // Should return None (need more data) and keep the bytes
        assert!(codec.decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), HEADER_SIZE + 2);

        partial.extend_from_slice(&full_buf);

        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded, Message::Data(Bytes::from_static(b"Hello")));
    }

    #[test]
    fn test_sequence_wraps() {
        let mut codec = FrameCodec::with_sequence(255, 255);

        let mut buf = BytesMut::new();
        codec.encode(Message::Eof, &mut buf).unwrap();
        codec.encode(Message::Eof, &mut buf).unwrap();
        assert_eq!(buf[3], 255);
        assert_eq!(buf[HEADER_SIZE + 3], 0);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Eof));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Eof));
        assert_eq!(codec.expected_recv_seq(), 1);
    }

    #[test]
    fn test_sequence_mismatch() {
        let mut sender = FrameCodec::with_sequence(3, 0);
        let mut receiver = FrameCodec::new();

        let mut buf = BytesMut::new();
        sender.encode(Message::Eof, &mut buf).unwrap();

        let result = receiver.decode(&mut buf);
        assert!(matches!(
            result,
            Err(ProtocolError::SequenceMismatch {
                expected: 0,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_payload_too_large() {
        let mut codec = FrameCodec::new();
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];

        let mut buf = BytesMut::new();
        let result = codec.encode_raw(Command::Data, &payload, &mut buf);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
        assert!(buf.is_empty());
        assert_eq!(codec.next_send_seq(), 0);
    }

    #[test]
    fn test_decode_eof_with_partial_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x00][..]);

        let result = codec.decode_eof(&mut buf);
        assert!(matches!(
            result,
            Err(ProtocolError::TruncatedFrame { pending: 3 })
        ));
    }
}
