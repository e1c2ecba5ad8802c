//! Window resize signal handling
//!
//! The `SIGWINCH` handler only sets an atomic flag. The signal is blocked
//! process-wide at startup (before any runtime thread exists) and unblocked
//! on the outbound worker's thread alone, so that thread's blocking read is
//! the one interrupted and it re-checks the flag right away.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use pt_protocol::WindowSize;

use crate::error::PumpError;
use crate::pump::WindowSource;
use crate::tty;

/// Starts set so the initial size is announced
static RESIZE_PENDING: AtomicBool = AtomicBool::new(true);

extern "C" fn on_resize(_signal: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::SeqCst);
}

/// Whether a resize is pending, clearing the flag
pub fn take_resize_pending() -> bool {
    RESIZE_PENDING.swap(false, Ordering::SeqCst)
}

fn resize_sigset() -> libc::sigset_t {
    // SAFETY: sigset_t is initialized by sigemptyset before use
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGWINCH);
        set
    }
}

fn change_mask(how: libc::c_int) -> io::Result<()> {
    let set = resize_sigset();
    // SAFETY: set is a valid signal set; the old mask is not requested
    let rc = unsafe { libc::pthread_sigmask(how, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

/// Block `SIGWINCH` on the calling thread and every thread it spawns later
pub fn block_resize_signal() -> io::Result<()> {
    change_mask(libc::SIG_BLOCK)
}

/// Unblock `SIGWINCH` on the calling thread only
pub fn unblock_resize_signal() -> io::Result<()> {
    change_mask(libc::SIG_UNBLOCK)
}

/// Install the flag-setting handler without `SA_RESTART`
pub fn install_resize_handler() -> io::Result<()> {
    // SAFETY: the handler is async-signal-safe (one atomic store)
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_resize as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        if libc::sigaction(libc::SIGWINCH, &action, std::ptr::null_mut()) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Window size source driven by `SIGWINCH`
#[derive(Debug)]
pub struct ResizeWatch {
    fd: RawFd,
    unblocked: bool,
}

impl ResizeWatch {
    /// Watch the terminal on `fd`, installing the signal handler
    pub fn install(fd: RawFd) -> io::Result<Self> {
        install_resize_handler()?;
        Ok(Self {
            fd,
            unblocked: false,
        })
    }
}

impl WindowSource for ResizeWatch {
    fn poll_resize(&mut self) -> Result<Option<WindowSize>, PumpError> {
        // First poll runs on the worker thread that should receive the signal
        if !self.unblocked {
            unblock_resize_signal().map_err(PumpError::WindowSize)?;
            self.unblocked = true;
        }

        if !take_resize_pending() {
            return Ok(None);
        }
        tty::window_size(self.fd)
            .map(Some)
            .map_err(PumpError::WindowSize)
    }
}
