//! pty-tunnel
//!
//! Single binary for both ends of a tunnelled terminal session:
//! - `front` captures the local terminal and drives a transport command
//! - `host` runs a program in a pseudo-terminal behind stdin/stdout
//! - `config` writes or prints the configuration file

use anyhow::{Context, Result};
use clap::Parser;
use pt_core::TunnelConfig;
use std::path::Path;

use pty_tunnel::cli::{Cli, Commands};
use pty_tunnel::commands;

fn main() {
    let cli = Cli::parse();
    pt_core::logging::init();

    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };

    // Terminal attributes are restored by the atexit hook, which only
    // runs through libc exit
    std::process::exit(code);
}

fn dispatch(cli: Cli) -> Result<i32> {
    let Cli { config, command } = cli;
    let path = config.as_deref();

    match command {
        Commands::Config { action } => commands::config::run(action, path),
        Commands::Front(args) => commands::front::run(args, &load_config(path)?),
        Commands::Host(args) => commands::host::run(args, &load_config(path)?),
    }
}

fn load_config(path: Option<&Path>) -> Result<TunnelConfig> {
    pt_core::config::resolve_config(path).context("Failed to load configuration")
}
