//! XBee 8-bit frame checksum

/// Running checksum over the payload of a single frame.
///
/// The module computes `0xFF - (sum of payload bytes mod 256)`; a frame is
/// valid when the payload sum plus the trailing checksum byte is `0xFF`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Checksum {
    sum: u8,
}

impl Checksum {
    /// Create an empty accumulator
    #[must_use]
    pub const fn new() -> Self {
        Self { sum: 0 }
    }

    /// Checksum byte for a complete payload
    #[must_use]
    pub fn of(payload: &[u8]) -> u8 {
        let mut checksum = Self::new();
        checksum.add_bytes(payload);
        checksum.compute()
    }

    /// Accumulate one byte
    pub fn add_byte(&mut self, byte: u8) {
        self.sum = self.sum.wrapping_add(byte);
    }

    /// Accumulate a run of bytes
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.add_byte(byte);
        }
    }

    /// Checksum byte for everything accumulated so far
    #[must_use]
    pub const fn compute(&self) -> u8 {
        0xFF - self.sum
    }

    /// Check a received checksum byte against the accumulated payload
    #[must_use]
    pub const fn verify(&self, candidate: u8) -> bool {
        self.sum.wrapping_add(candidate) == 0xFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_frame() {
        // AT command "ND", frame id 1
        let payload = [0x08, 0x01, 0x4E, 0x44];
        assert_eq!(Checksum::of(&payload), 0x64);
    }

    #[test]
    fn test_empty_payload() {
        let checksum = Checksum::new();
        assert_eq!(checksum.compute(), 0xFF);
        assert!(checksum.verify(0xFF));
        assert!(!checksum.verify(0x00));
    }

    #[test]
    fn test_sum_wraps() {
        let mut checksum = Checksum::new();
        checksum.add_bytes(&[0xFF, 0xFF, 0x03]);
        // 0x201 mod 256 = 0x01
        assert_eq!(checksum.compute(), 0xFE);
    }

    proptest! {
        #[test]
        fn prop_computed_checksum_verifies(payload in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut checksum = Checksum::new();
            checksum.add_bytes(&payload);
            prop_assert!(checksum.verify(Checksum::of(&payload)));
        }

        #[test]
        fn prop_single_bit_flip_detected(
            payload in prop::collection::vec(any::<u8>(), 1..512),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let expected = Checksum::of(&payload);
            let mut corrupted = payload.clone();
            let i = index.index(corrupted.len());
            corrupted[i] ^= 1 << bit;

            let mut checksum = Checksum::new();
            checksum.add_bytes(&corrupted);
            prop_assert!(!checksum.verify(expected));
        }
    }
}
