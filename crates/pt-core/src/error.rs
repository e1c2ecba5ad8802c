//! Core error types for pty-tunnel

use pt_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the pty-tunnel endpoints
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Pump worker error
    #[error("Pump error: {0}")]
    Pump(#[from] PumpError),

    /// Session setup error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that end a pump direction
#[derive(Error, Debug)]
pub enum PumpError {
    /// Framing or transport protocol violation
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Local source or sink failed
    #[error("Local I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Querying or applying a window size failed
    #[error("Window size: {0}")]
    WindowSize(std::io::Error),

    /// A shared sender was poisoned by a panicking worker
    #[error("Frame sender lock poisoned")]
    Poisoned,

    /// The worker unwound before reporting a result
    #[error("Worker panicked")]
    Panicked,
}

/// Resource acquisition errors raised before any worker starts
#[derive(Error, Debug)]
pub enum SessionError {
    /// Pseudo-terminal allocation failed
    #[error("PTY allocation failed: {0}")]
    PtyAllocation(std::io::Error),

    /// Spawning the child program failed
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A piped stdio handle was not available after spawn
    #[error("Child {0} pipe unavailable")]
    MissingPipe(&'static str),

    /// Terminal attribute or size operation failed
    #[error("Terminal operation failed: {0}")]
    Terminal(std::io::Error),

    /// Installing a signal handler failed
    #[error("Signal setup failed: {0}")]
    Signal(std::io::Error),

    /// Greeting marker was never seen on the transport
    #[error("Transport closed before greeting marker")]
    GreetingMissing,

    /// No command was given where one is required
    #[error("No command given")]
    EmptyCommand,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Refused to replace an existing config file
    #[error("Config file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
