//! Byte stuffing for escaped API mode
//!
//! In [`ApiMode::ApiEnabledEscaped`] the four reserved bytes never appear
//! literally after the start delimiter. Each one is sent as
//! [`ESCAPE`] followed by the byte XOR `0x20`.

use bytes::BufMut;

use super::{ApiMode, ESCAPE, Error, Result, START_DELIMITER, XOFF, XON};

/// Value XORed into an escaped byte
pub const ESCAPE_MASK: u8 = 0x20;

/// Check if a byte must be escaped in escaped API mode
#[inline]
#[must_use]
pub const fn is_reserved(byte: u8) -> bool {
    matches!(byte, START_DELIMITER | ESCAPE | XON | XOFF)
}

/// Escape a complete frame.
///
/// The leading start delimiter is copied as-is; every reserved byte in the
/// length, payload and checksum region is replaced by its escape sequence.
#[must_use]
pub fn escape(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() + frame.len() / 8 + 1);
    let Some((&first, rest)) = frame.split_first() else {
        return out;
    };

    out.push(first);
    for &byte in rest {
        if is_reserved(byte) {
            out.push(ESCAPE);
            out.push(byte ^ ESCAPE_MASK);
        } else {
            out.push(byte);
        }
    }
    out
}

/// Streaming decoder for bytes arriving from the module.
///
/// An escape marker at the end of one chunk is remembered and applied to the
/// first byte of the next chunk.
#[derive(Debug, Default, Clone)]
pub struct Unescaper {
    pending_escape: bool,
}

impl Unescaper {
    /// Create a decoder with no pending escape
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending_escape: false,
        }
    }

    /// Decode a chunk, appending the result to `out`.
    ///
    /// Outside escaped mode bytes pass through unchanged. In escaped mode a
    /// start delimiter is copied through (it always marks a new frame) and
    /// an unescaped XON/XOFF is a framing error.
    pub fn decode(&mut self, mode: ApiMode, input: &[u8], out: &mut impl BufMut) -> Result<()> {
        if !mode.is_escaped() {
            out.put_slice(input);
            return Ok(());
        }

        for &byte in input {
            if self.pending_escape {
                self.pending_escape = false;
                out.put_u8(byte ^ ESCAPE_MASK);
                continue;
            }

            match byte {
                ESCAPE => self.pending_escape = true,
                START_DELIMITER => out.put_u8(byte),
                XON | XOFF => return Err(Error::Framing { byte }),
                _ => out.put_u8(byte),
            }
        }
        Ok(())
    }

    /// Check if the last decoded byte was an escape marker
    #[must_use]
    pub const fn has_pending_escape(&self) -> bool {
        self.pending_escape
    }

    /// Forget any pending escape
    pub fn reset(&mut self) {
        self.pending_escape = false;
    }
}

/// Decode a complete escaped byte sequence
pub fn unescape(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len());
    Unescaper::new().decode(ApiMode::ApiEnabledEscaped, bytes, &mut out)?;
    Ok(out)
}
