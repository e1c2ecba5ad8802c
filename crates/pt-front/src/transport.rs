//! Transport command process
//!
//! The front reaches the host by running a command (typically
//! `ssh box pty-tunnel host`) whose stdin and stdout carry the framed
//! stream. Its stderr stays attached to the user's terminal so password
//! prompts and connection errors remain visible.

use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use pt_core::SessionError;

/// A running transport command and the two ends of its stream
#[derive(Debug)]
pub struct TransportProcess {
    pub child: Child,
    /// Frames to the host
    pub stdin: ChildStdin,
    /// Frames from the host
    pub stdout: ChildStdout,
}

/// Spawn the transport command with its stdin and stdout piped
pub fn spawn_transport(argv: &[String]) -> Result<TransportProcess, SessionError> {
    let (program, args) = argv.split_first().ok_or(SessionError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| SessionError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdin = child.stdin.take().ok_or(SessionError::MissingPipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(SessionError::MissingPipe("stdout"))?;

    tracing::debug!("Spawned transport {:?} [pid:{}]", argv, child.id());
    Ok(TransportProcess {
        child,
        stdin,
        stdout,
    })
}
