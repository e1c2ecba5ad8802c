//! pt-host: Host endpoint of a pty-tunnel session
//!
//! The host owns a freshly allocated pseudo-terminal (or a trio of pipes)
//! in which the target program runs, and forwards that program's terminal
//! over the framed transport on its own stdin/stdout.

pub mod pty;
pub mod session;
pub mod sink;

pub use session::{run, HostOptions};
