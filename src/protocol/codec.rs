//! XBee API frame codec (encode/decode)
//!
//! ```text
//! [0x7E] [LENGTH (2, big-endian)] [PAYLOAD (LENGTH bytes)] [CHECKSUM (1)]
//! ```
//!
//! The payload starts with the API identifier. The checksum covers the
//! payload only.

use bytes::{BufMut, Bytes};

use super::{
    Checksum, Error, FRAME_OVERHEAD, LENGTH_SIZE, MAX_PAYLOAD_SIZE, Result, START_DELIMITER,
    escape,
};

/// Wrap a payload in an unescaped API frame
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }

    let mut bytes = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
    bytes.put_u8(START_DELIMITER);
    bytes.put_u16(payload.len() as u16);
    bytes.put_slice(payload);
    bytes.put_u8(Checksum::of(payload));
    Ok(bytes)
}

/// Wrap a payload in an API frame with reserved bytes escaped
pub fn encode_escaped(payload: &[u8]) -> Result<Vec<u8>> {
    encode(payload).map(|frame| escape::escape(&frame))
}

/// Length of the complete frame at the start of `bytes`, if the header is present
#[must_use]
pub fn frame_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < 1 + LENGTH_SIZE {
        return None;
    }
    let payload_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    Some(payload_len + FRAME_OVERHEAD)
}

/// Decode one complete, unescaped frame and return its payload
///
/// # Errors
///
/// Returns an error if:
/// - Buffer is shorter than the declared frame
/// - The first byte is not the start delimiter
/// - Checksum doesn't match
pub fn decode(bytes: Bytes) -> Result<Bytes> {
    let total_size = frame_len(&bytes).ok_or(Error::BufferTooSmall {
        needed: FRAME_OVERHEAD,
        got: bytes.len(),
    })?;

    if bytes.len() < total_size {
        return Err(Error::BufferTooSmall {
            needed: total_size,
            got: bytes.len(),
        });
    }

    if bytes[0] != START_DELIMITER {
        return Err(Error::Framing { byte: bytes[0] });
    }

    let payload = bytes.slice(1 + LENGTH_SIZE..total_size - 1);
    let stored = bytes[total_size - 1];
    let mut checksum = Checksum::new();
    checksum.add_bytes(&payload);

    if !checksum.verify(stored) {
        return Err(Error::ChecksumMismatch {
            expected: checksum.compute(),
            found: stored,
        });
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_at_command() {
        // AT command "ND" with frame id 1
        let frame = encode(&[0x08, 0x01, b'N', b'D']).unwrap();
        assert_eq!(frame, [0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x44, 0x64]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let payload = [0x88, 0x01, b'D', b'B', 0x00, 0x28];
        let frame = encode(&payload).unwrap();
        let decoded = decode(Bytes::from(frame)).unwrap();
        assert_eq!(decoded.as_ref(), payload);
    }

    #[test]
    fn test_escaped_frame_contains_no_reserved_bytes() {
        // Frame id 0x11 must be escaped
        let frame = encode_escaped(&[0x08, 0x11, b'A', b'P']).unwrap();
        assert_eq!(frame[0], START_DELIMITER);
        assert!(frame[1..].iter().all(|&b| !matches!(b, 0x7E | 0x11 | 0x13)));
        assert!(frame.contains(&0x31));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut frame = encode(&[0x8A, 0x02]).unwrap();
        let len = frame.len();
        frame[len - 1] ^= 0xFF;

        let result = decode(Bytes::from(frame));
        assert!(matches!(result, Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_buffer_too_small() {
        let result = decode(Bytes::from_static(&[0x7E, 0x00, 0x05, 0x88]));
        assert!(matches!(
            result,
            Err(Error::BufferTooSmall { needed: 9, got: 4 })
        ));
    }

    #[test]
    fn test_decode_missing_delimiter() {
        let mut frame = encode(&[0x8A, 0x00]).unwrap();
        frame[0] = 0x00;
        let result = decode(Bytes::from(frame));
        assert!(matches!(result, Err(Error::Framing { byte: 0x00 })));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            encode(&payload),
            Err(Error::PayloadTooLarge { .. })
        ));
    }
}
