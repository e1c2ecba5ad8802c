//! Tunnel endpoint configuration

use serde::{Deserialize, Serialize};

/// Marker the host writes before pumping starts
pub const DEFAULT_GREETING: &str = "PTY_SLAVE_GREETING";

/// Program the host runs when none is given
pub const DEFAULT_HOST_COMMAND: &str = "/bin/sh";

/// Configuration shared by both endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// Wrap the transport in the text-safe encoding.
    ///
    /// Both endpoints must agree on this setting.
    pub base64: bool,

    /// Greeting marker exchanged before pumping
    pub greeting: String,

    /// Front endpoint settings
    pub front: FrontConfig,

    /// Host endpoint settings
    pub host: HostConfig,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            base64: false,
            greeting: DEFAULT_GREETING.to_string(),
            front: FrontConfig::default(),
            host: HostConfig::default(),
        }
    }
}

/// Front endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontConfig {
    /// Send an EOF frame when local input ends
    pub send_eof: bool,

    /// Discard transport output until the greeting marker is seen
    pub expect_greeting: bool,

    /// Keep ^C and ^Z as local signals instead of forwarding them
    pub cbreak: bool,
}

impl Default for FrontConfig {
    fn default() -> Self {
        Self {
            send_eof: true,
            expect_greeting: false,
            cbreak: false,
        }
    }
}

/// Host endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Program and arguments to run
    pub command: Vec<String>,

    /// Use three plain pipes instead of a pseudo-terminal
    pub pipe: bool,

    /// Write the greeting marker before pumping
    pub announce_greeting: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command: vec![DEFAULT_HOST_COMMAND.to_string()],
            pipe: false,
            announce_greeting: false,
        }
    }
}
