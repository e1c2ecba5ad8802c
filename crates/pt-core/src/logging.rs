//! Log output setup
//!
//! Lines go to stderr prefixed with `[<program>:<pid>]` so output from the
//! two endpoints can be told apart when they share a terminal. Each line
//! ends in `\r\n` because the terminal may be in raw mode, where a bare
//! newline does not return the cursor.

use std::fmt::{self, Write as _};
use std::path::Path;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config;

/// Event formatter producing `[program:pid] LEVEL message\r\n`
#[derive(Debug, Clone)]
pub struct TunnelFormat {
    prefix: String,
}

impl TunnelFormat {
    /// Formatter for an explicit program name and pid
    pub fn new(program: &str, pid: u32) -> Self {
        Self {
            prefix: format!("[{}:{}]", program, pid),
        }
    }

    /// Formatter for the running process
    pub fn for_current_process() -> Self {
        Self::new(&program_name(), std::process::id())
    }
}

impl<S, N> FormatEvent<S, N> for TunnelFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "{} {} ", self.prefix, event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writer.write_str("\r\n")
    }
}

/// Default filter directive when `RUST_LOG` is unset
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `PTY_TUNNEL_DEBUG` selects between
/// debug and warning output. Calling this twice keeps the first subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config::debug_enabled())));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .event_format(TunnelFormat::for_current_process()),
        )
        .try_init();

    if result.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Basename of the program as invoked
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
