//! Stream framing for STX/ETX delimited frames
//!
//! Frame format: `[STX] [length: 4 hex digits] [payload] [ETX]`
//!
//! The decoder accepts arbitrary chunks of a byte stream (split mid-frame or
//! carrying several frames at once) and yields the bytes between STX and ETX.
//! The returned payload therefore starts with the length digits.
//!
//! Buffering is bounded: garbage before the first STX is discarded, and an
//! unterminated frame that grows past `max_buffer` is dropped.

use super::constants::{ETX, FRAME_OVERHEAD, LENGTH_FIELD_DIGITS, STX};
use super::fixed::parse_hex_u32;
use crate::error::{Error, Result};

/// Default upper bound for a pending, unterminated frame
pub const DEFAULT_MAX_BUFFER: usize = 64 * 1024;

/// Incremental frame decoder
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_buffer: usize,
    strict_length: bool,
    dropped: u64,
}

impl FrameDecoder {
    /// Create a decoder with default limits and lenient length handling
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_BUFFER, false)
    }

    /// Create a decoder with explicit limits
    ///
    /// With `strict_length`, frames whose declared length does not match the
    /// actual marker-inclusive size are dropped.
    pub fn with_limits(max_buffer: usize, strict_length: bool) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_buffer,
            strict_length,
            dropped: 0,
        }
    }

    /// Append a chunk and iterate over the frames it completes
    ///
    /// Frames not consumed from the iterator stay buffered and are returned
    /// by the next call to [`FrameDecoder::next_frame`] or `feed`.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.push(chunk);
        Frames { decoder: self }
    }

    /// Append a chunk without extracting frames
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Extract the next complete frame payload, if any
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            let Some(start) = self.buffer.iter().position(|&b| b == STX) else {
                // No frame start anywhere: everything is garbage
                if !self.buffer.is_empty() {
                    log::trace!("Discarding {} bytes without frame start", self.buffer.len());
                    self.buffer.clear();
                }
                return None;
            };

            if start > 0 {
                self.buffer.drain(..start);
            }

            let Some(end) = self.buffer[1..].iter().position(|&b| b == ETX).map(|i| i + 1)
            else {
                if self.buffer.len() > self.max_buffer {
                    let err = Error::Framing(format!(
                        "unterminated frame exceeds {} bytes",
                        self.max_buffer
                    ));
                    log::warn!("{}, dropping", err);
                    self.buffer.clear();
                    self.dropped += 1;
                }
                return None;
            };

            let payload: Vec<u8> = self.buffer[1..end].to_vec();
            self.buffer.drain(..=end);

            if self.strict_length
                && let Err(e) = check_length(&payload)
            {
                log::warn!("{}, dropping frame", e);
                self.dropped += 1;
                continue;
            }

            return Some(payload);
        }
    }

    /// Bytes currently held for an incomplete frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Frames dropped by the buffer limit or the length check
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Forget any buffered bytes
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over frames completed so far
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_frame()
    }
}

/// Compare the declared length field against the actual frame size
fn check_length(payload: &[u8]) -> Result<()> {
    if payload.len() < LENGTH_FIELD_DIGITS {
        return Err(Error::Framing(format!(
            "frame too short for length field ({} bytes)",
            payload.len()
        )));
    }
    let digits = std::str::from_utf8(&payload[..LENGTH_FIELD_DIGITS])
        .map_err(|_| Error::Framing("non-ASCII length field".to_string()))?;
    let declared = parse_hex_u32(digits)
        .map_err(|e| Error::Framing(format!("bad length field: {}", e)))?
        as usize;
    let actual = payload.len() - LENGTH_FIELD_DIGITS + FRAME_OVERHEAD;
    if declared != actual {
        return Err(Error::Framing(format!(
            "declared length {} != actual {}",
            declared, actual
        )));
    }
    Ok(())
}
