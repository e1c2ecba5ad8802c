//! Host-side frame sinks
//!
//! In pty mode keystrokes go to the master and window sizes are applied to
//! it; end of input becomes the slave's EOF character. In pipe mode
//! keystrokes go to the child's stdin and window sizes have nowhere to go.

use std::fs::File;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::process::ChildStdin;

use pt_core::{tty, FrameSink, PumpError};
use pt_protocol::WindowSize;

/// Sink writing to a pty master
#[derive(Debug)]
pub struct PtySink {
    master: File,
    child: libc::pid_t,
}

impl PtySink {
    /// `child` is notified with `SIGWINCH` after each resize
    pub fn new(master: File, child: u32) -> Self {
        Self {
            master,
            child: child as libc::pid_t,
        }
    }

    fn signal_child(&self, signal: libc::c_int) {
        // SAFETY: kill has no memory preconditions; a child that already
        // exited just makes this fail
        if unsafe { libc::kill(self.child, signal) } == -1 {
            tracing::debug!(
                "Could not signal child [pid:{}][sig:{}]: {}",
                self.child,
                signal,
                std::io::Error::last_os_error()
            );
        }
    }
}

impl FrameSink for PtySink {
    fn data(&mut self, payload: &[u8]) -> Result<(), PumpError> {
        self.master.write_all(payload)?;
        Ok(())
    }

    fn resize(&mut self, size: WindowSize) -> Result<(), PumpError> {
        tracing::debug!("Applying window size [rows:{}][cols:{}]", size.rows, size.cols);
        tty::set_window_size(self.master.as_raw_fd(), size).map_err(PumpError::WindowSize)?;
        self.signal_child(libc::SIGWINCH);
        Ok(())
    }

    /// Type the slave's EOF character, as a user pressing ^D would.
    ///
    /// Sent twice: a pending partial line takes the first one. A program that
    /// switched the slave out of canonical mode gets nothing and decides for
    /// itself when to exit.
    fn eof(&mut self) -> Result<(), PumpError> {
        // On a master, tcgetattr reports the slave's settings
        let attrs = match tty::get_attrs(self.master.as_raw_fd()) {
            Ok(attrs) => attrs,
            Err(e) => {
                tracing::debug!("Could not read slave attributes: {}", e);
                return Ok(());
            }
        };
        if attrs.c_lflag & libc::ICANON == 0 {
            tracing::debug!("Slave is not canonical, leaving end of input to the child");
            return Ok(());
        }

        let veof = attrs.c_cc[libc::VEOF];
        tracing::debug!("Writing VEOF [{:#04x}] to the slave", veof);
        match self.master.write_all(&[veof, veof]) {
            // Every slave descriptor is closed; the child is already gone
            Err(e) if e.raw_os_error() == Some(libc::EIO) => {
                tracing::debug!("Slave closed before end of input: {}", e);
                Ok(())
            }
            result => Ok(result?),
        }
    }

    /// The front is gone; hang up the child like a closed terminal would
    fn hangup(&mut self) -> Result<(), PumpError> {
        tracing::debug!("Transport closed, hanging up child [pid:{}]", self.child);
        self.signal_child(libc::SIGHUP);
        Ok(())
    }
}

/// Sink writing to the child's stdin pipe.
///
/// Dropping the sink closes the pipe, which is how an EOF frame reaches
/// the child.
#[derive(Debug)]
pub struct PipeSink {
    stdin: ChildStdin,
}

impl PipeSink {
    pub fn new(stdin: ChildStdin) -> Self {
        Self { stdin }
    }
}

impl FrameSink for PipeSink {
    fn data(&mut self, payload: &[u8]) -> Result<(), PumpError> {
        self.stdin.write_all(payload)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn resize(&mut self, size: WindowSize) -> Result<(), PumpError> {
        tracing::debug!(
            "Ignoring window size [rows:{}][cols:{}] without a pty",
            size.rows,
            size.cols
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::{open_master, spawn_in_pty, spawn_piped, PtyChild, PtyOptions};
    use pt_protocol::ProtocolError;
    use std::io::Read;

    #[test]
    fn test_pty_sink_applies_window_size() {
        let master = open_master().unwrap();
        // A nonexistent pid; the resize itself must still succeed
        let mut sink = PtySink::new(master.try_clone_file().unwrap(), i32::MAX as u32);

        sink.resize(WindowSize::new(33, 111)).unwrap();
        assert_eq!(
            tty::window_size(master.as_raw_fd()).unwrap(),
            WindowSize::new(33, 111)
        );
    }

    #[test]
    fn test_pty_sink_rejects_stderr() {
        let master = open_master().unwrap();
        let mut sink = PtySink::new(master.try_clone_file().unwrap(), i32::MAX as u32);
        assert!(matches!(
            sink.stderr(b"x"),
            Err(PumpError::Protocol(ProtocolError::UnexpectedCommand("ERR")))
        ));
    }

    fn read_to_hangup(child: &PtyChild) -> String {
        let mut reader = child.master.reader().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_pty_sink_eof_ends_canonical_input() {
        let argv = vec!["cat".to_string()];
        let mut spawned = spawn_in_pty(&argv, &PtyOptions::default()).unwrap();
        let mut sink = PtySink::new(spawned.master.try_clone_file().unwrap(), spawned.child.id());

        sink.data(b"typed line\n").unwrap();
        sink.eof().unwrap();
        drop(sink);

        let output = read_to_hangup(&spawned);
        assert!(output.contains("typed line"), "output: {:?}", output);
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn test_pty_sink_eof_flushes_partial_line() {
        let argv = vec!["cat".to_string()];
        let mut spawned = spawn_in_pty(&argv, &PtyOptions::default()).unwrap();
        let mut sink = PtySink::new(spawned.master.try_clone_file().unwrap(), spawned.child.id());

        sink.data(b"no newline").unwrap();
        sink.eof().unwrap();
        drop(sink);

        let output = read_to_hangup(&spawned);
        assert!(output.contains("no newline"), "output: {:?}", output);
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn test_pty_sink_eof_after_child_exit() {
        let argv = vec!["true".to_string()];
        let mut spawned = spawn_in_pty(&argv, &PtyOptions::default()).unwrap();
        let mut sink = PtySink::new(spawned.master.try_clone_file().unwrap(), spawned.child.id());

        read_to_hangup(&spawned);
        assert!(spawned.child.wait().unwrap().success());
        sink.eof().unwrap();
    }

    #[test]
    fn test_pty_sink_hangup_ends_child() {
        let argv = vec!["sleep".to_string(), "30".to_string()];
        let mut spawned = spawn_in_pty(&argv, &PtyOptions::default()).unwrap();
        let mut sink = PtySink::new(spawned.master.try_clone_file().unwrap(), spawned.child.id());

        sink.hangup().unwrap();
        let status = spawned.child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_pipe_sink_feeds_child_and_closes_on_drop() {
        let argv = vec!["cat".to_string()];
        let mut piped = spawn_piped(&argv).unwrap();

        let mut sink = PipeSink::new(piped.stdin);
        sink.data(b"keys").unwrap();
        sink.resize(WindowSize::new(10, 10)).unwrap();
        drop(sink);

        let mut out = String::new();
        piped.stdout.read_to_string(&mut out).unwrap();
        assert_eq!(out, "keys");
        assert!(piped.child.wait().unwrap().success());
    }
}
