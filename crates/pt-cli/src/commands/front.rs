//! `pty-tunnel front`

use anyhow::{Context, Result};
use pt_core::{TerminalMode, TunnelConfig};
use pt_front::FrontOptions;
use pt_protocol::Encoding;

use crate::cli::FrontArgs;

/// Merge flags over the config file; flags only ever switch things on,
/// except `--no-eof`
pub fn options(args: FrontArgs, config: &TunnelConfig) -> FrontOptions {
    let expect_greeting = args.expect_greeting || config.front.expect_greeting;
    FrontOptions {
        command: args.command,
        encoding: Encoding::from_flag(args.base64 || config.base64),
        send_eof: config.front.send_eof && !args.no_eof,
        greeting: expect_greeting.then(|| config.greeting.clone()),
        terminal_mode: if args.cbreak || config.front.cbreak {
            TerminalMode::Cbreak
        } else {
            TerminalMode::Raw
        },
    }
}

/// Run the front endpoint and return its exit code
pub fn run(args: FrontArgs, config: &TunnelConfig) -> Result<i32> {
    let options = options(args, config);
    tracing::debug!("Front starting transport {:?}", options.command);

    // Must happen before any runtime thread exists so every thread inherits
    // the blocked mask
    pt_core::signal::block_resize_signal().context("Failed to block SIGWINCH")?;

    super::block_on(pt_front::run(options))
}
