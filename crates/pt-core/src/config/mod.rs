//! Configuration management for pty-tunnel

mod tunnel;

pub use tunnel::{FrontConfig, HostConfig, TunnelConfig, DEFAULT_GREETING, DEFAULT_HOST_COMMAND};

use crate::error::ConfigError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable that enables debug logging when set to a non-zero integer
pub const DEBUG_ENV: &str = "PTY_TUNNEL_DEBUG";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pty-tunnel")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load a tunnel configuration file
pub fn load_config(path: &Path) -> Result<TunnelConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => {
            return Err(ConfigError::Invalid(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    Ok(toml::from_str(&content)?)
}

/// Write `config` to `path`, creating missing parent directories.
///
/// An existing file is only replaced when `overwrite` is set.
pub fn save_config(path: &Path, config: &TunnelConfig, overwrite: bool) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::Invalid(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .create_new(!overwrite)
        .truncate(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => ConfigError::AlreadyExists(path.to_path_buf()),
            _ => ConfigError::Invalid(format!("Failed to write {}: {}", path.display(), e)),
        })?;
    file.write_all(content.as_bytes())
        .map_err(|e| ConfigError::Invalid(format!("Failed to write {}: {}", path.display(), e)))
}

/// Resolve the configuration for one run.
///
/// An explicit path must exist. Without one, the default path is used when
/// present and built-in defaults otherwise.
pub fn resolve_config(explicit: Option<&Path>) -> Result<TunnelConfig, ConfigError> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let path = default_config_path();
            if path.exists() {
                tracing::debug!("Loading config from {:?}", path);
                load_config(&path)
            } else {
                Ok(TunnelConfig::default())
            }
        }
    }
}

/// Whether `PTY_TUNNEL_DEBUG` enables debug logging. Read once per process.
pub fn debug_enabled() -> bool {
    static DEBUG: OnceLock<bool> = OnceLock::new();
    *DEBUG.get_or_init(|| parse_debug_flag(std::env::var(DEBUG_ENV).ok().as_deref()))
}

fn parse_debug_flag(value: Option<&str>) -> bool {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .is_some_and(|v| v != 0)
}
