//! Child process spawning
//!
//! Either inside a fresh pseudo-terminal, where the slave becomes the
//! child's controlling terminal and its stdin/stdout/stderr, or over three
//! plain pipes with no terminal semantics at all.

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use pt_core::{tty, SessionError};
use pt_protocol::WindowSize;

use super::master::{open_master, PtyMaster};

/// Initial slave settings applied in the child before exec
#[derive(Clone, Copy, Default)]
pub struct PtyOptions {
    /// Terminal attributes for the slave
    pub termios: Option<libc::termios>,
    /// Window size for the slave
    pub window: Option<WindowSize>,
}

/// A child running on the slave side of a pty
#[derive(Debug)]
pub struct PtyChild {
    pub master: PtyMaster,
    pub child: Child,
}

/// A child wired to three pipes
#[derive(Debug)]
pub struct PipedChild {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

fn command_for(argv: &[String]) -> Result<(String, Command), SessionError> {
    let (program, args) = argv.split_first().ok_or(SessionError::EmptyCommand)?;
    let mut command = Command::new(program);
    command.args(args);
    Ok((program.clone(), command))
}

/// Spawn `argv` with a new pty as its controlling terminal.
///
/// The parent only ever holds the master; the slave is opened in the child
/// after `setsid`, so the child's exit hangs up the master.
pub fn spawn_in_pty(argv: &[String], options: &PtyOptions) -> Result<PtyChild, SessionError> {
    let (program, mut command) = command_for(argv)?;
    let master = open_master()?;

    let slave_path = master.slave_path().to_owned();
    let termios = options.termios;
    let winsize = options.window.map(tty::to_winsize);

    // SAFETY: the closure runs between fork and exec and only makes
    // async-signal-safe calls on data captured before the fork
    unsafe {
        command.pre_exec(move || {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }

            // First terminal opened by a session leader becomes its controlling tty
            let slave = libc::open(slave_path.as_ptr(), libc::O_RDWR);
            if slave == -1 {
                return Err(io::Error::last_os_error());
            }

            #[cfg(not(any(target_os = "linux", target_os = "android")))]
            if libc::ioctl(slave, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }

            if let Some(attrs) = &termios {
                if libc::tcsetattr(slave, libc::TCSANOW, attrs) == -1 {
                    return Err(io::Error::last_os_error());
                }
            }

            if let Some(ws) = &winsize {
                if libc::ioctl(slave, libc::TIOCSWINSZ, ws) == -1 {
                    return Err(io::Error::last_os_error());
                }
            }

            for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                if libc::dup2(slave, target) == -1 {
                    return Err(io::Error::last_os_error());
                }
            }

            if slave > libc::STDERR_FILENO {
                libc::close(slave);
            }
            Ok(())
        });
    }

    let child = command
        .spawn()
        .map_err(|source| SessionError::Spawn { program, source })?;

    tracing::debug!(
        "Spawned {:?} [pid:{}] on {:?}",
        argv,
        child.id(),
        master.slave_path()
    );
    Ok(PtyChild { master, child })
}

/// Spawn `argv` with its stdin, stdout and stderr connected to pipes
pub fn spawn_piped(argv: &[String]) -> Result<PipedChild, SessionError> {
    let (program, mut command) = command_for(argv)?;
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SessionError::Spawn { program, source })?;

    let stdin = child.stdin.take().ok_or(SessionError::MissingPipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(SessionError::MissingPipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(SessionError::MissingPipe("stderr"))?;

    tracing::debug!("Spawned {:?} [pid:{}] on pipes", argv, child.id());
    Ok(PipedChild {
        child,
        stdin,
        stdout,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn read_to_hangup(child: &PtyChild) -> String {
        let mut reader = child.master.reader().unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[test]
    fn test_pty_child_output_reaches_master() {
        let mut spawned =
            spawn_in_pty(&argv(&["/bin/sh", "-c", "echo tunnel-ok"]), &PtyOptions::default())
                .unwrap();
        let output = read_to_hangup(&spawned);
        assert!(output.contains("tunnel-ok"), "output: {:?}", output);
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn test_pty_child_is_on_a_terminal_with_initial_size() {
        let options = PtyOptions {
            termios: None,
            window: Some(WindowSize::new(30, 100)),
        };
        let mut spawned = spawn_in_pty(
            &argv(&["/bin/sh", "-c", "test -t 0 && test -t 2 && stty size"]),
            &options,
        )
        .unwrap();
        let output = read_to_hangup(&spawned);
        assert!(output.contains("30 100"), "output: {:?}", output);
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn test_pty_child_gets_initial_attributes() {
        let template = open_master().unwrap();
        let mut termios = tty::get_attrs(template.as_raw_fd()).unwrap();
        termios.c_lflag &= !libc::ECHO;

        let options = PtyOptions {
            termios: Some(termios),
            window: None,
        };
        let mut spawned = spawn_in_pty(&argv(&["stty", "-a"]), &options).unwrap();
        let output = read_to_hangup(&spawned);
        assert!(output.contains("-echo "), "output: {:?}", output);
        assert!(spawned.child.wait().unwrap().success());
    }

    #[test]
    fn test_piped_child_roundtrip() {
        let PipedChild {
            mut child,
            mut stdin,
            mut stdout,
            mut stderr,
        } = spawn_piped(&argv(&["/bin/sh", "-c", "cat; echo done >&2"])).unwrap();

        stdin.write_all(b"through the pipe").unwrap();
        drop(stdin);

        let mut out = String::new();
        stdout.read_to_string(&mut out).unwrap();
        let mut err = String::new();
        stderr.read_to_string(&mut err).unwrap();

        assert_eq!(out, "through the pipe");
        assert_eq!(err, "done\n");
        assert!(child.wait().unwrap().success());
    }

    #[test]
    fn test_empty_command() {
        assert!(matches!(
            spawn_piped(&[]),
            Err(SessionError::EmptyCommand)
        ));
        assert!(matches!(
            spawn_in_pty(&[], &PtyOptions::default()),
            Err(SessionError::EmptyCommand)
        ));
    }

    #[test]
    fn test_exec_failure_is_reported() {
        let result = spawn_in_pty(&argv(&["/nonexistent/pty-tunnel-test"]), &PtyOptions::default());
        match result {
            Err(SessionError::Spawn { program, source }) => {
                assert_eq!(program, "/nonexistent/pty-tunnel-test");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected spawn error, got {:?}", other.map(|c| c.child.id())),
        }
    }
}
