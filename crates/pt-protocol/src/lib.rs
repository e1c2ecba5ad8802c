//! pt-protocol: Wire protocol for pty-tunnel sessions
//!
//! This crate defines the framed protocol spoken between the front and host
//! endpoints of a tunnel, the parser that extracts frames from a byte
//! stream, and the transport that optionally wraps the stream in a
//! text-safe encoding.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod parser;
pub mod sender;
pub mod textsafe;
pub mod transport;

pub use codec::FrameCodec;
pub use error::{ProtocolError, TextSafeError};
pub use frame::{FrameHeader, HEADER_SIZE, INPUT_BUFFER_SIZE, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{Command, Message, WindowSize};
pub use parser::{Flow, Parser};
pub use sender::FrameSender;
pub use transport::{Encoding, Transport, TransportReader, TransportWriter};
