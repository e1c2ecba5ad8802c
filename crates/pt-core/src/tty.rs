//! Terminal mode and window size helpers

use std::io;
use std::os::unix::io::RawFd;
use std::sync::OnceLock;

use pt_protocol::WindowSize;

/// Whether `fd` refers to a terminal
pub fn is_tty(fd: RawFd) -> bool {
    // SAFETY: isatty only inspects the descriptor
    unsafe { libc::isatty(fd) == 1 }
}

/// Read the terminal attributes of `fd`
pub fn get_attrs(fd: RawFd) -> io::Result<libc::termios> {
    // SAFETY: termios is plain data and fully written by tcgetattr on success
    let mut attrs: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut attrs) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(attrs)
}

/// Apply terminal attributes to `fd`
pub fn set_attrs(fd: RawFd, action: libc::c_int, attrs: &libc::termios) -> io::Result<()> {
    // SAFETY: attrs points to a valid termios
    if unsafe { libc::tcsetattr(fd, action, attrs) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Noncanonical mode with all input and output processing disabled
pub fn make_raw(attrs: &mut libc::termios) {
    attrs.c_lflag &= !(libc::ICANON | libc::ISIG | libc::IEXTEN | libc::ECHO);
    attrs.c_iflag &= !(libc::BRKINT
        | libc::ICRNL
        | libc::IGNBRK
        | libc::IGNCR
        | libc::INLCR
        | libc::INPCK
        | libc::ISTRIP
        | libc::IXON
        | libc::PARMRK);
    attrs.c_oflag &= !libc::OPOST;
    attrs.c_cc[libc::VMIN] = 1;
    attrs.c_cc[libc::VTIME] = 0;
}

/// Noncanonical mode without echo; signals still generated
pub fn make_cbreak(attrs: &mut libc::termios) {
    attrs.c_lflag &= !(libc::ICANON | libc::ECHO);
    attrs.c_lflag |= libc::ISIG;
    attrs.c_iflag &= !libc::ICRNL;
    attrs.c_cc[libc::VMIN] = 1;
    attrs.c_cc[libc::VTIME] = 0;
}

/// Put `fd` in raw mode, returning the previous attributes
pub fn set_raw(fd: RawFd) -> io::Result<libc::termios> {
    let previous = get_attrs(fd)?;
    let mut attrs = previous;
    make_raw(&mut attrs);
    set_attrs(fd, libc::TCSAFLUSH, &attrs)?;
    Ok(previous)
}

/// Put `fd` in cbreak mode, returning the previous attributes.
///
/// Assumes the terminal is in cooked mode; it does not undo [`set_raw`].
pub fn set_cbreak(fd: RawFd) -> io::Result<libc::termios> {
    let previous = get_attrs(fd)?;
    let mut attrs = previous;
    make_cbreak(&mut attrs);
    set_attrs(fd, libc::TCSAFLUSH, &attrs)?;
    Ok(previous)
}

static SAVED_ATTRS: OnceLock<(RawFd, libc::termios)> = OnceLock::new();

extern "C" fn restore_saved_attrs() {
    if let Some((fd, attrs)) = SAVED_ATTRS.get() {
        // SAFETY: attrs was captured from this descriptor
        unsafe {
            libc::tcsetattr(*fd, libc::TCSANOW, attrs);
        }
    }
}

/// Restore `attrs` on `fd` when the process exits through libc `exit`.
///
/// Only the first registration takes effect.
pub fn restore_on_exit(fd: RawFd, attrs: libc::termios) -> io::Result<()> {
    if SAVED_ATTRS.set((fd, attrs)).is_err() {
        tracing::debug!("Terminal restore already registered");
        return Ok(());
    }
    // SAFETY: the hook only reads a static
    if unsafe { libc::atexit(restore_saved_attrs) } != 0 {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "failed to register terminal restore hook",
        ));
    }
    Ok(())
}

/// How a captured terminal is configured for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminalMode {
    /// Every byte goes to the peer, including ^C and ^Z
    #[default]
    Raw,
    /// Unbuffered without echo, but ^C and ^Z still signal this process
    Cbreak,
}

/// Switch `fd` to `mode` and restore its attributes at exit
pub fn enter_mode(fd: RawFd, mode: TerminalMode) -> io::Result<()> {
    let previous = match mode {
        TerminalMode::Raw => set_raw(fd)?,
        TerminalMode::Cbreak => set_cbreak(fd)?,
    };
    restore_on_exit(fd, previous)
}

/// Put `fd` in raw mode and restore its attributes at exit
pub fn enter_raw_mode(fd: RawFd) -> io::Result<()> {
    enter_mode(fd, TerminalMode::Raw)
}

/// Query the window size of the terminal on `fd`
pub fn window_size(fd: RawFd) -> io::Result<WindowSize> {
    // SAFETY: winsize is plain data written by the ioctl on success
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(WindowSize::new(ws.ws_row, ws.ws_col))
}

/// Set the window size of the terminal on `fd`
pub fn set_window_size(fd: RawFd, size: WindowSize) -> io::Result<()> {
    let ws = to_winsize(size);
    // SAFETY: ws is a valid winsize
    if unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Convert to the kernel representation
pub fn to_winsize(size: WindowSize) -> libc::winsize {
    libc::winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}
