//! pt-core: Session plumbing for pty-tunnel
//!
//! This crate provides configuration, error types, logging setup, the
//! duplex pump workers and their completion controller, plus the terminal
//! and signal helpers shared by the front and host endpoints.

pub mod config;
pub mod error;
pub mod greeting;
pub mod logging;
pub mod pump;
pub mod session;
pub mod signal;
pub mod stdio;
pub mod tty;

pub use config::TunnelConfig;
pub use error::{ConfigError, PumpError, SessionError, TunnelError};
pub use pump::{
    pump_inbound, pump_outbound, shared_sender, EofGate, FrameSink, OutboundPump, OutputChannel,
    SharedSender, StreamSink, WindowSource,
};
pub use session::{Direction, DirectionSet, SessionContext, SessionController, SessionOutcome};
pub use signal::ResizeWatch;
pub use tty::TerminalMode;
