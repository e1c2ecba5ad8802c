//! pt-front: Front endpoint of a pty-tunnel session
//!
//! The front owns the user's real terminal. It runs the transport command
//! that reaches the host, puts the terminal in raw mode, and forwards
//! keystrokes and window resizes while writing the host's output back.

pub mod session;
pub mod transport;

pub use session::{run, run_with, FrontOptions, LocalIo};
pub use transport::{spawn_transport, TransportProcess};
