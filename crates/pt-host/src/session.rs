//! Host endpoint session
//!
//! The host speaks the framed protocol on its own stdin/stdout and runs the
//! target program either in a pty or over three pipes. The session is over
//! once the program's output has been fully forwarded.

use std::fs::File;
use std::process::Child;

use pt_core::pump::{pump_inbound, pump_outbound, shared_sender, EofGate, OutboundPump, OutputChannel};
use pt_core::session::{Direction, DirectionSet, SessionController};
use pt_core::{greeting, stdio, tty, SessionError, TunnelError};
use pt_protocol::{Encoding, FrameSender, Transport, TransportReader, TransportWriter};

use crate::pty::{spawn_in_pty, spawn_piped, PipedChild, PtyChild, PtyOptions};
use crate::sink::{PipeSink, PtySink};

/// How the host runs its program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    /// Program and arguments
    pub command: Vec<String>,
    /// Transport encoding on stdin/stdout
    pub encoding: Encoding,
    /// Use pipes instead of a pty
    pub pipe: bool,
    /// Marker written raw to stdout before pumping
    pub greeting: Option<String>,
}

/// Run the host endpoint until the program's output is exhausted.
///
/// Returns the process exit code. Setup failures are returned as errors
/// before any worker has started.
pub async fn run(options: HostOptions) -> Result<i32, TunnelError> {
    if options.pipe {
        run_piped(options).await
    } else {
        run_pty(options).await
    }
}

async fn run_pty(options: HostOptions) -> Result<i32, TunnelError> {
    let interactive = tty::is_tty(libc::STDIN_FILENO);
    let pty_options = if interactive {
        inherited_pty_options(libc::STDIN_FILENO)
    } else {
        PtyOptions::default()
    };
    let PtyChild { master, mut child } = spawn_in_pty(&options.command, &pty_options)?;

    // Keep the local line discipline from echoing or cooking the frames
    if interactive {
        tty::enter_raw_mode(libc::STDIN_FILENO).map_err(SessionError::Terminal)?;
    }

    let (reader, writer) = local_transport(&options)?;
    let sender = shared_sender(FrameSender::new(writer));
    let source = master.reader()?;
    let sink = PtySink::new(master.try_clone_file()?, child.id());

    let mut controller = SessionController::new();
    controller.spawn(Direction::Outbound, move |ctx| {
        pump_outbound(ctx, OutboundPump::new(source, sender))
    });
    controller.spawn(Direction::Inbound, move |ctx| pump_inbound(ctx, reader, sink));

    let outcome = controller
        .wait_for(DirectionSet::of(&[Direction::Outbound]))
        .await;
    log_child_status(&mut child);
    Ok(outcome.exit_code())
}

async fn run_piped(options: HostOptions) -> Result<i32, TunnelError> {
    let PipedChild {
        mut child,
        stdin,
        stdout,
        stderr,
    } = spawn_piped(&options.command)?;

    let (reader, writer) = local_transport(&options)?;
    let sender = shared_sender(FrameSender::new(writer));
    let err_sender = sender.clone();
    let gate = EofGate::new(2);
    let err_gate = gate.clone();

    let mut controller = SessionController::new();
    controller.spawn(Direction::Outbound, move |ctx| {
        pump_outbound(ctx, OutboundPump::new(stdout, sender).eof_gate(gate))
    });
    controller.spawn(Direction::ErrOutbound, move |ctx| {
        pump_outbound(
            ctx,
            OutboundPump::new(stderr, err_sender)
                .channel(OutputChannel::Stderr)
                .eof_gate(err_gate),
        )
    });
    controller.spawn(Direction::Inbound, move |ctx| {
        pump_inbound(ctx, reader, PipeSink::new(stdin))
    });

    let outcome = controller
        .wait_for(DirectionSet::of(&[Direction::Outbound, Direction::ErrOutbound]))
        .await;
    log_child_status(&mut child);
    Ok(outcome.exit_code())
}

/// Settings of the terminal the host itself runs on, for the child's pty.
///
/// Captured before that terminal is switched to raw mode.
fn inherited_pty_options(fd: libc::c_int) -> PtyOptions {
    PtyOptions {
        termios: tty::get_attrs(fd)
            .map_err(|e| tracing::debug!("Not inheriting terminal attributes: {}", e))
            .ok(),
        window: tty::window_size(fd)
            .map_err(|e| tracing::debug!("Not inheriting window size: {}", e))
            .ok(),
    }
}

/// Transport over this process's stdin/stdout, after the optional greeting
fn local_transport(
    options: &HostOptions,
) -> Result<(TransportReader<File>, TransportWriter<File>), TunnelError> {
    let input = stdio::stdin_file()?;
    let mut output = stdio::stdout_file()?;

    if let Some(marker) = &options.greeting {
        greeting::announce(&mut output, marker)?;
    }

    Ok(Transport::new(input, output, options.encoding).into_split())
}

fn log_child_status(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => tracing::debug!("Child [pid:{}] exited: {}", child.id(), status),
        Ok(None) => tracing::debug!("Child [pid:{}] still running", child.id()),
        Err(e) => tracing::warn!("Failed to check child [pid:{}]: {}", child.id(), e),
    }
}
