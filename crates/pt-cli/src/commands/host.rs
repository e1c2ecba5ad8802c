//! `pty-tunnel host`

use anyhow::Result;
use pt_core::TunnelConfig;
use pt_host::HostOptions;
use pt_protocol::Encoding;

use crate::cli::HostArgs;

/// Merge flags over the config file
pub fn options(args: HostArgs, config: &TunnelConfig) -> HostOptions {
    let command = if args.command.is_empty() {
        config.host.command.clone()
    } else {
        args.command
    };
    let announce = args.greeting || config.host.announce_greeting;

    HostOptions {
        command,
        encoding: Encoding::from_flag(args.base64 || config.base64),
        pipe: args.pipe || config.host.pipe,
        greeting: announce.then(|| config.greeting.clone()),
    }
}

/// Run the host endpoint and return its exit code
pub fn run(args: HostArgs, config: &TunnelConfig) -> Result<i32> {
    let options = options(args, config);
    tracing::debug!(
        "Host running {:?} ({})",
        options.command,
        if options.pipe { "pipes" } else { "pty" }
    );

    super::block_on(pt_host::run(options))
}
