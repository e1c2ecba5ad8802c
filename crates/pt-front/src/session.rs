//! Front endpoint session
//!
//! The front owns the user's terminal: keystrokes and resizes flow out to
//! the host, program output flows back to stdout. The session ends when the
//! host's output is done, whether or not local input has ended.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdout};

use pt_core::pump::{
    pump_inbound, pump_outbound, shared_sender, EofGate, OutboundPump, StreamSink, WindowSource,
};
use pt_core::session::{Direction, DirectionSet, SessionController};
use pt_core::{greeting, stdio, tty, ResizeWatch, SessionError, TerminalMode, TunnelError};
use pt_protocol::{Encoding, FrameSender, Transport};

use crate::transport::{spawn_transport, TransportProcess};

/// How the front reaches the host and what it sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontOptions {
    /// Transport command and arguments
    pub command: Vec<String>,
    /// Transport encoding on the command's stdin/stdout
    pub encoding: Encoding,
    /// Send an EOF frame when local input ends
    pub send_eof: bool,
    /// Discard transport output until this marker has been seen
    pub greeting: Option<String>,
    /// Mode the local terminal is put in while the session runs
    pub terminal_mode: TerminalMode,
}

/// Local ends of a front session
pub struct LocalIo<I, O, E> {
    /// Keystrokes
    pub input: I,
    /// DATA frames from the host
    pub output: O,
    /// ERR frames from the host
    pub errors: E,
    /// Source of window size changes, if input is a terminal
    pub window: Option<Box<dyn WindowSource>>,
}

/// Run the front endpoint on this process's terminal.
///
/// Returns the process exit code. Setup failures are returned as errors
/// before any worker has started.
pub async fn run(options: FrontOptions) -> Result<i32, TunnelError> {
    let transport = spawn_transport(&options.command)?;

    let interactive = tty::is_tty(libc::STDIN_FILENO);
    let window: Option<Box<dyn WindowSource>> = if interactive {
        tty::enter_mode(libc::STDIN_FILENO, options.terminal_mode)
            .map_err(SessionError::Terminal)?;
        let watch = ResizeWatch::install(libc::STDIN_FILENO).map_err(SessionError::Signal)?;
        Some(Box::new(watch))
    } else {
        None
    };

    let local = LocalIo {
        input: stdio::stdin_file()?,
        output: stdio::stdout_file()?,
        errors: stdio::stderr_file()?,
        window,
    };
    run_with(options, transport, local).await
}

/// Run a front session over an already spawned transport
pub async fn run_with<I, O, E>(
    options: FrontOptions,
    transport: TransportProcess,
    local: LocalIo<I, O, E>,
) -> Result<i32, TunnelError>
where
    I: Read + Send + 'static,
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    let TransportProcess {
        mut child,
        stdin,
        stdout,
    } = transport;

    let stdout = match options.greeting {
        Some(marker) => wait_for_greeting(stdout, marker).await?,
        None => stdout,
    };

    let (reader, writer) = Transport::new(stdout, stdin, options.encoding).into_split();
    let sender = shared_sender(FrameSender::new(writer));

    let mut outbound = OutboundPump::new(local.input, sender).stop_on_peer_eof(true);
    if !options.send_eof {
        outbound = outbound.eof_gate(EofGate::disabled());
    }
    if let Some(window) = local.window {
        outbound = outbound.window(window);
    }
    let sink = StreamSink::new(local.output, local.errors);

    let mut controller = SessionController::new();
    controller.spawn(Direction::Outbound, move |ctx| pump_outbound(ctx, outbound));
    controller.spawn(Direction::Inbound, move |ctx| pump_inbound(ctx, reader, sink));

    let outcome = controller
        .wait_for(DirectionSet::of(&[Direction::Inbound]))
        .await;
    log_transport_status(&mut child);
    Ok(outcome.exit_code())
}

async fn wait_for_greeting(
    mut stdout: ChildStdout,
    marker: String,
) -> Result<ChildStdout, TunnelError> {
    tokio::task::spawn_blocking(move || {
        greeting::wait_for(&mut stdout, &marker)?;
        Ok::<_, TunnelError>(stdout)
    })
    .await
    .map_err(|e| TunnelError::Io(io::Error::other(e)))?
}

fn log_transport_status(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => tracing::debug!("Transport [pid:{}] exited: {}", child.id(), status),
        Ok(None) => tracing::debug!("Transport [pid:{}] still running", child.id()),
        Err(e) => tracing::warn!("Failed to check transport [pid:{}]: {}", child.id(), e),
    }
}
