//! `pty-tunnel config`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pt_core::config::{self, TunnelConfig};

use crate::cli::ConfigAction;

/// The file `--config` names, or the per-user default
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Run a config action and return the exit code
pub fn run(action: ConfigAction, explicit: Option<&Path>) -> Result<i32> {
    match action {
        ConfigAction::Init { force } => {
            let path = init(explicit, force)?;
            println!("Wrote {}", path.display());
        }
        ConfigAction::Show => print!("{}", show(explicit)?),
        ConfigAction::Path => println!("{}", config_path(explicit).display()),
    }
    Ok(0)
}

/// Write the default configuration and return where it went
pub fn init(explicit: Option<&Path>, force: bool) -> Result<PathBuf> {
    let path = config_path(explicit);
    config::save_config(&path, &TunnelConfig::default(), force)
        .with_context(|| format!("Failed to initialise {}", path.display()))?;
    tracing::debug!("Wrote default configuration to {:?}", path);
    Ok(path)
}

/// Render the configuration a front or host run would use
pub fn show(explicit: Option<&Path>) -> Result<String> {
    let config = config::resolve_config(explicit).context("Failed to load configuration")?;
    toml::to_string_pretty(&config).context("Failed to render configuration")
}
