//! Subcommand implementations

pub mod config;
pub mod front;
pub mod host;

use std::future::Future;

use anyhow::{Context, Result};

/// Drive `session` on a fresh multi-thread runtime and return its exit code.
///
/// Pump workers may still be parked in blocking reads when the session
/// completes, so the runtime is released without joining them.
pub fn block_on<F>(session: F) -> Result<i32>
where
    F: Future<Output = Result<i32, pt_core::TunnelError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(session);
    runtime.shutdown_background();
    Ok(result?)
}
