//! Greeting handshake
//!
//! The host writes a fixed marker to its stdout before pumping starts. The
//! front can discard everything the transport produces until it has seen
//! that marker, which skips login banners and similar noise.

use std::io::{ErrorKind, Read, Write};

use crate::error::{SessionError, TunnelError};

/// Write the marker raw, bypassing any transport encoding
pub fn announce<W: Write>(out: &mut W, marker: &str) -> std::io::Result<()> {
    out.write_all(marker.as_bytes())?;
    out.flush()
}

/// Consume bytes from `input` one at a time until `marker` has been read.
///
/// Reads byte by byte so nothing past the marker is consumed. Returns the
/// number of bytes discarded before the marker.
pub fn wait_for<R: Read + ?Sized>(input: &mut R, marker: &str) -> Result<usize, TunnelError> {
    let marker = marker.as_bytes();
    if marker.is_empty() {
        return Ok(0);
    }

    let mut matched = 0;
    let mut total = 0usize;
    let mut byte = [0u8; 1];
    while matched < marker.len() {
        match input.read(&mut byte) {
            Ok(0) => return Err(SessionError::GreetingMissing.into()),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
        total += 1;

        matched = advance(marker, matched, byte[0]);
    }

    let skipped = total - marker.len();
    if skipped > 0 {
        tracing::debug!("Skipped {} bytes before greeting", skipped);
    }
    Ok(skipped)
}

/// Length of the longest marker prefix that is a suffix of the input seen so
/// far, after appending `byte`
fn advance(marker: &[u8], matched: usize, byte: u8) -> usize {
    let mut candidate = matched;
    loop {
        if marker[candidate] == byte {
            return candidate + 1;
        }
        if candidate == 0 {
            return 0;
        }
        // Fall back to the longest proper border of marker[..candidate]
        candidate = (1..candidate)
            .rev()
            .find(|&k| marker[..k] == marker[candidate - k..candidate])
            .unwrap_or(0);
    }
}
