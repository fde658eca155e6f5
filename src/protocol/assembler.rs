//! Streaming frame assembly
//!
//! Bytes arrive from the transport in arbitrary chunks. [`FrameAssembler`]
//! buffers them and hands out complete, checksum-valid frame payloads;
//! [`FrameReader`] puts the escape decoder in front of it.

use bytes::{Buf, Bytes, BytesMut};

use super::{ApiMode, Checksum, FRAME_OVERHEAD, LENGTH_SIZE, Result, START_DELIMITER, Unescaper, codec};

/// Default receive buffer capacity
const INITIAL_CAPACITY: usize = 1024;

/// Accumulates unescaped bytes and extracts complete frames.
///
/// A frame is only released when the buffer starts with the start
/// delimiter, holds the full declared length and the checksum verifies.
/// Otherwise the buffer is left untouched and the assembler waits for more
/// bytes. It does not scan forward past a leading byte that is not a start
/// delimiter.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Create an empty assembler
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append decoded bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete frame payload.
    ///
    /// Returns `None` while the buffered bytes do not (yet) form a valid
    /// frame; bytes following an extracted frame stay buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        if self.buffer.len() < FRAME_OVERHEAD {
            return None;
        }

        let start_ok = self.buffer[0] == START_DELIMITER;
        if !start_ok || !self.length_and_checksum_ok() {
            return None;
        }

        let total = codec::frame_len(&self.buffer)?;
        let mut frame = self.buffer.split_to(total);
        frame.advance(1 + LENGTH_SIZE);
        frame.truncate(frame.len() - 1);
        Some(frame.freeze())
    }

    fn length_and_checksum_ok(&self) -> bool {
        let Some(total) = codec::frame_len(&self.buffer) else {
            return false;
        };
        if self.buffer.len() < total {
            return false;
        }

        let mut checksum = Checksum::new();
        checksum.add_bytes(&self.buffer[1 + LENGTH_SIZE..total - 1]);
        checksum.verify(self.buffer[total - 1])
    }

    /// Number of buffered bytes
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Buffered bytes not yet released as a frame
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Escape decoder and frame assembler for one receive stream.
#[derive(Debug, Default)]
pub struct FrameReader {
    unescaper: Unescaper,
    assembler: FrameAssembler,
    scratch: Vec<u8>,
}

impl FrameReader {
    /// Create an empty reader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw chunk from the transport into the receive buffer.
    ///
    /// On a framing error the whole receive buffer is discarded and the
    /// reader resumes with the next chunk.
    pub fn feed(&mut self, mode: ApiMode, chunk: &[u8]) -> Result<()> {
        self.scratch.clear();
        if let Err(err) = self.unescaper.decode(mode, chunk, &mut self.scratch) {
            self.reset();
            return Err(err);
        }
        self.assembler.push(&self.scratch);
        Ok(())
    }

    /// Extract the next complete frame payload
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.assembler.next_frame()
    }

    /// Number of buffered (decoded) bytes
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.assembler.buffered_len()
    }

    /// Drop all buffered state
    pub fn reset(&mut self) {
        self.unescaper.reset();
        self.assembler.clear();
        self.scratch.clear();
    }
}
