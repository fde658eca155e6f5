//! Bounds-checked big-endian reader over a frame payload

use bytes::{Buf, Bytes};

use super::{Error, Result};

/// Cursor over a frame payload.
///
/// Every read checks the remaining length first and fails with
/// [`Error::BufferTooSmall`] instead of panicking.
#[derive(Debug, Clone)]
pub(crate) struct PayloadReader {
    bytes: Bytes,
    consumed: usize,
}

impl PayloadReader {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self { bytes, consumed: 0 }
    }

    pub(crate) fn peek_u8(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.bytes.remaining() < needed {
            return Err(Error::BufferTooSmall {
                needed: self.consumed + needed,
                got: self.consumed + self.bytes.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        self.consumed += 1;
        Ok(self.bytes.get_u8())
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        self.consumed += 2;
        Ok(self.bytes.get_u16())
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        self.consumed += 8;
        Ok(self.bytes.get_u64())
    }

    pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.ensure(N)?;
        self.consumed += N;
        let mut out = [0u8; N];
        self.bytes.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Null-terminated string; the terminator is consumed but not returned.
    /// A missing terminator takes the rest of the payload.
    pub(crate) fn read_cstring(&mut self) -> Result<String> {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len());
        let raw = self.bytes.split_to(end);
        self.consumed += end;
        if self.bytes.has_remaining() {
            self.bytes.advance(1);
            self.consumed += 1;
        }
        Ok(String::from_utf8(raw.to_vec())?)
    }

    /// Everything not yet consumed
    pub(crate) fn read_rest(&mut self) -> Bytes {
        self.consumed += self.bytes.len();
        std::mem::take(&mut self.bytes)
    }
}

/// Big-endian unsigned value of however many bytes the module returned
pub(crate) fn be_value(bytes: &[u8]) -> Result<u32> {
    if bytes.len() > 4 {
        return Err(Error::PayloadTooLarge {
            size: bytes.len(),
            max: 4,
        });
    }
    Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_big_endian() {
        let mut reader = PayloadReader::new(Bytes::from_static(&[
            0x01, 0x02, 0x03, 0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x2B, 0xAA, 0xFF,
        ]));
        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x0203);
        assert_eq!(reader.read_u64().unwrap(), 0x0013_A200_4052_2BAA);
        assert_eq!(reader.read_rest().len(), 1);
    }

    #[test]
    fn test_short_read_fails() {
        let mut reader = PayloadReader::new(Bytes::from_static(&[0x01, 0x02, 0x03]));
        reader.read_u8().unwrap();
        let result = reader.read_array::<4>();
        assert!(matches!(
            result,
            Err(Error::BufferTooSmall { needed: 5, got: 3 })
        ));
        // Nothing consumed by the failed read
        assert_eq!(reader.read_rest().len(), 2);
    }

    #[test]
    fn test_cstring() {
        let mut reader = PayloadReader::new(Bytes::from_static(b"ROUTER\0\x01"));
        assert_eq!(reader.read_cstring().unwrap(), "ROUTER");
        assert_eq!(reader.read_u8().unwrap(), 0x01);

        let mut unterminated = PayloadReader::new(Bytes::from_static(b"END"));
        assert_eq!(unterminated.read_cstring().unwrap(), "END");
        assert!(unterminated.read_rest().is_empty());
    }

    #[test]
    fn test_be_value_widths() {
        assert_eq!(be_value(&[]).unwrap(), 0);
        assert_eq!(be_value(&[0x28]).unwrap(), 0x28);
        assert_eq!(be_value(&[0x0C, 0xE4]).unwrap(), 3300);
        assert!(be_value(&[0; 5]).is_err());
    }
}
