//! Pseudo-terminal master allocation

use std::ffi::{CStr, CString};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use pt_core::SessionError;

/// Master side of a pseudo-terminal plus the path of its slave device
#[derive(Debug)]
pub struct PtyMaster {
    fd: OwnedFd,
    slave_path: CString,
}

impl PtyMaster {
    /// Path of the slave device, e.g. `/dev/pts/3`
    pub fn slave_path(&self) -> &CStr {
        &self.slave_path
    }

    /// Raw descriptor of the master
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Duplicate the master descriptor as a file
    pub fn try_clone_file(&self) -> io::Result<File> {
        Ok(File::from(self.fd.try_clone()?))
    }

    /// Reader over a duplicate of the master descriptor
    pub fn reader(&self) -> io::Result<PtyReader> {
        Ok(PtyReader(self.try_clone_file()?))
    }
}

/// Open a new pseudo-terminal master with its slave granted and unlocked.
///
/// The master is close-on-exec so spawned children never inherit it.
pub fn open_master() -> Result<PtyMaster, SessionError> {
    // SAFETY: posix_openpt has no memory preconditions
    let raw = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
    if raw == -1 {
        return Err(SessionError::PtyAllocation(io::Error::last_os_error()));
    }
    // SAFETY: raw is a freshly opened descriptor owned by nobody else;
    // dropping it on any error below closes the master
    let fd = unsafe { OwnedFd::from_raw_fd(raw) };

    let check = |rc: libc::c_int| {
        if rc == -1 {
            Err(SessionError::PtyAllocation(io::Error::last_os_error()))
        } else {
            Ok(())
        }
    };

    // SAFETY: fd is a valid pty master for all three calls
    check(unsafe { libc::grantpt(raw) })?;
    check(unsafe { libc::unlockpt(raw) })?;
    check(unsafe { libc::fcntl(raw, libc::F_SETFD, libc::FD_CLOEXEC) })?;

    let slave_path = slave_name(raw).map_err(SessionError::PtyAllocation)?;
    tracing::debug!("Opened pty master [fd:{}] slave {:?}", raw, slave_path);

    Ok(PtyMaster { fd, slave_path })
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn slave_name(fd: RawFd) -> io::Result<CString> {
    let mut buf = vec![0u8; 128];
    // SAFETY: buf is writable for its full length
    let rc = unsafe { libc::ptsname_r(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    buf.truncate(len);
    CString::new(buf).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn slave_name(fd: RawFd) -> io::Result<CString> {
    // SAFETY: ptsname returns a pointer to static storage or null; it is
    // copied out before any other pty call on this thread
    let name = unsafe { libc::ptsname(fd) };
    if name.is_null() {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { CStr::from_ptr(name) }.to_owned())
}

/// Reader over the pty master that reports a hung-up slave as end of input.
///
/// Linux fails reads on the master with `EIO` once every slave descriptor
/// has been closed, which is how the child's exit shows up.
#[derive(Debug)]
pub struct PtyReader(File);

impl Read for PtyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.0.read(buf) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.raw_os_error() == Some(libc::EIO) => return Ok(0),
                other => return other,
            }
        }
    }
}
