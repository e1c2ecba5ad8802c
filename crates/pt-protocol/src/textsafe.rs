//! Text-safe transport encoding
//!
//! Standard base64 (`A-Za-z0-9+/`, `=` padding) applied as a stream: each
//! write is encoded independently, so padded units may appear in the middle
//! of the stream. The decoder works unit by unit, skips any byte that is not
//! part of the alphabet (line breaks inserted by serial consoles, stray
//! whitespace) and rejects padding that appears too early in a unit.

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::TextSafeError;

/// Standard alphabet with padding; unused low bits of a final unit are ignored
const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Padding character
pub const PAD: u8 = b'=';

/// Characters in one encoded unit
pub const UNIT_LEN: usize = 4;

/// Plaintext bytes carried by one full unit
pub const UNIT_PLAIN_LEN: usize = 3;

/// Encoded length of `len` plaintext bytes
pub fn encoded_len(len: usize) -> usize {
    len.div_ceil(UNIT_PLAIN_LEN) * UNIT_LEN
}

/// Whether a byte is part of the alphabet or the padding character
pub fn is_significant(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/' || byte == PAD
}

/// Encode `input` into the front of `output`, returning the encoded length
pub fn encode(input: &[u8], output: &mut [u8]) -> Result<usize, TextSafeError> {
    let needed = encoded_len(input.len());
    if output.len() < needed {
        return Err(TextSafeError::OutputTooSmall {
            needed,
            available: output.len(),
        });
    }
    ENGINE
        .encode_slice(input, &mut output[..needed])
        .map_err(|_| TextSafeError::OutputTooSmall {
            needed,
            available: output.len(),
        })
}

/// How far one decode pass got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    /// Encoded bytes consumed from the input (including skipped noise)
    pub consumed: usize,
    /// Plaintext bytes written to the output
    pub written: usize,
}

/// Decode as many whole units of `input` as fit in `output`.
///
/// Stops at the first incomplete unit or at the first unit whose plaintext
/// does not fit. Noise preceding an undecoded unit is consumed; the
/// significant characters of that unit are not.
pub fn decode(input: &[u8], output: &mut [u8]) -> Result<DecodeProgress, TextSafeError> {
    let mut consumed = 0;
    let mut written = 0;
    let mut pos = 0;

    loop {
        let mut unit = [0u8; UNIT_LEN];
        let mut filled = 0;
        let mut unit_start = None;

        while filled < UNIT_LEN && pos < input.len() {
            let byte = input[pos];
            if is_significant(byte) {
                unit_start.get_or_insert(pos);
                unit[filled] = byte;
                filled += 1;
            }
            pos += 1;
        }

        let Some(start) = unit_start else {
            // Only noise left
            consumed = input.len();
            break;
        };
        if filled < UNIT_LEN {
            consumed = start;
            break;
        }

        let plain_len = unit_plain_len(&unit)?;
        if written + plain_len > output.len() {
            consumed = start;
            break;
        }

        let mut plain = [0u8; UNIT_PLAIN_LEN];
        let n = ENGINE
            .decode_slice(unit, &mut plain)
            .map_err(|e| TextSafeError::InvalidUnit(format!("{:?}: {}", unit_text(&unit), e)))?;
        output[written..written + n].copy_from_slice(&plain[..n]);
        written += n;
        consumed = pos;
    }

    Ok(DecodeProgress { consumed, written })
}

fn unit_plain_len(unit: &[u8; UNIT_LEN]) -> Result<usize, TextSafeError> {
    if let Some(position) = unit[..2].iter().position(|&b| b == PAD) {
        return Err(TextSafeError::InvalidPadding { position });
    }
    match (unit[2] == PAD, unit[3] == PAD) {
        (false, false) => Ok(3),
        (false, true) => Ok(2),
        (true, true) => Ok(1),
        (true, false) => Err(TextSafeError::InvalidUnit(unit_text(unit))),
    }
}

fn unit_text(unit: &[u8; UNIT_LEN]) -> String {
    String::from_utf8_lossy(unit).into_owned()
}
