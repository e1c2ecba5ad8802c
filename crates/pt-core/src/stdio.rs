//! Unbuffered handles on the process's standard streams
//!
//! Each handle owns a duplicate of the descriptor, so it can move to a
//! worker thread and be read or written without going through the
//! line-buffered `std::io` wrappers.

use std::fs::File;
use std::io;
use std::os::unix::io::AsFd;

/// Duplicate of fd 0
pub fn stdin_file() -> io::Result<File> {
    Ok(File::from(io::stdin().as_fd().try_clone_to_owned()?))
}

/// Duplicate of fd 1
pub fn stdout_file() -> io::Result<File> {
    Ok(File::from(io::stdout().as_fd().try_clone_to_owned()?))
}

/// Duplicate of fd 2
pub fn stderr_file() -> io::Result<File> {
    Ok(File::from(io::stderr().as_fd().try_clone_to_owned()?))
}
