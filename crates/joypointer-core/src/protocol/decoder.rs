//! Text decoder that pulls complete telemetry frames out of a byte stream.
//!
//! Serial reads do not line up with frame boundaries.  One read may carry
//! half a frame, the next may carry the rest plus two more frames and some
//! line noise.  The decoder therefore keeps an accumulation buffer:
//!
//! ```text
//! read #1:  "xxS+1:-2"            buffer = "xxS+1:-2"          frames = []
//! read #2:  ":0ES+0:+0:1E"        buffer = "xx"                frames = [S+1:-2:0E, S+0:+0:1E]
//! ```
//!
//! # Tokenizer
//!
//! Extraction is an explicit scanner rather than a pattern engine.  At every
//! `S` it tries to read `field (':' field)* 'E'`, where a field is an optional
//! `+`/`-` followed by one or more ASCII digits.  On success the whole frame
//! is cut out of the buffer and scanning resumes right after the `E`; on
//! failure the scanner moves one character forward.  The field *count* is not
//! checked here, so a frame of the wrong schema still comes out as a
//! [`RawFrame`] and is rejected later by [`parse_frame`](super::frame::parse_frame).
//!
//! # Buffer bound
//!
//! Unmatched text stays in the buffer so that a frame split across reads can
//! be completed later.  [`FrameDecoder`] caps the residue at a configurable
//! length: once exceeded, everything before the last `S` is dropped (no
//! earlier `S` can still start a frame, because a frame never contains a
//! second `S`).  If there is no `S`, or the tail alone is still too long, the
//! residue is cleared.

use thiserror::Error;
use tracing::warn;

use super::frame::{RawFrame, FIELD_SEPARATOR, FRAME_END, FRAME_START};

/// Default cap on unmatched residue kept between reads.
pub const DEFAULT_MAX_BUFFER_LEN: usize = 512;

/// Bytes received from the device could not be interpreted as text.
///
/// Unlike a `FrameFormatError`, this means the link itself is suspect and the
/// connection is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("received bytes are not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },
}

// ── Pure functions ────────────────────────────────────────────────────────────

/// Appends `new_bytes` to `buffer` and extracts every complete frame.
///
/// Returns the residue (the buffer with all matched frames removed) and the
/// frames in the order they appeared.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidUtf8`] if `new_bytes` is not valid UTF-8.
///
/// # Examples
///
/// ```rust
/// use joypointer_core::protocol::decoder::decode;
///
/// let (rest, frames) = decode("ab", b"S+1:+2:0EcdS+3").unwrap();
/// assert_eq!(rest, "abcdS+3");
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].as_str(), "S+1:+2:0E");
/// ```
pub fn decode(buffer: &str, new_bytes: &[u8]) -> Result<(String, Vec<RawFrame>), DecodeError> {
    let text = std::str::from_utf8(new_bytes).map_err(|e| DecodeError::InvalidUtf8 {
        valid_up_to: e.valid_up_to(),
    })?;

    let mut combined = String::with_capacity(buffer.len() + text.len());
    combined.push_str(buffer);
    combined.push_str(text);
    Ok(extract_frames(&combined))
}

/// Extracts every non-overlapping frame from `buffer`.
///
/// Returns `(residue, frames)` where `residue` is `buffer` with each matched
/// frame cut out.
pub fn extract_frames(buffer: &str) -> (String, Vec<RawFrame>) {
    let bytes = buffer.as_bytes();
    let mut residue = String::with_capacity(buffer.len());
    let mut frames = Vec::new();

    // `copy_from` marks the start of the unmatched run not yet copied into
    // `residue`.  All cut points sit on ASCII bytes, so every slice below is
    // on a char boundary.
    let mut copy_from = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == FRAME_START as u8 {
            if let Some(end) = match_frame_at(bytes, pos) {
                residue.push_str(&buffer[copy_from..pos]);
                frames.push(RawFrame::from(&buffer[pos..end]));
                pos = end;
                copy_from = end;
                continue;
            }
        }
        pos += 1;
    }

    residue.push_str(&buffer[copy_from..]);
    (residue, frames)
}

/// Tries to read one frame starting at `start` (which holds `S`).
///
/// Returns the exclusive end index of the frame on success.
fn match_frame_at(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    loop {
        if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        let digits_start = i;
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        if i == digits_start {
            return None;
        }

        match bytes.get(i).copied() {
            Some(b) if b == FIELD_SEPARATOR as u8 => i += 1,
            Some(b) if b == FRAME_END as u8 => return Some(i + 1),
            _ => return None,
        }
    }
}

// ── Stateful decoder ──────────────────────────────────────────────────────────

/// Accumulating decoder owned by one connection's reader.
///
/// Wraps [`decode`] with two pieces of state: the residue between reads and
/// up to three trailing bytes of a UTF-8 sequence that a read cut in half.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: String,
    pending: Vec<u8>,
    max_buffer_len: usize,
    discarded: usize,
}

impl FrameDecoder {
    /// Creates a decoder whose residue never grows past `max_buffer_len`.
    pub fn new(max_buffer_len: usize) -> Self {
        Self {
            buffer: String::new(),
            pending: Vec::new(),
            max_buffer_len,
            discarded: 0,
        }
    }

    /// Feeds one read's worth of bytes and returns the frames it completed.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidUtf8`] when the bytes contain a sequence
    /// that can never be valid UTF-8.  An incomplete sequence at the very end
    /// is held back until the next call instead.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<RawFrame>, DecodeError> {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let complete_len = match std::str::from_utf8(&input) {
            Ok(_) => input.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                return Err(DecodeError::InvalidUtf8 {
                    valid_up_to: e.valid_up_to(),
                })
            }
        };

        let (head, tail) = input.split_at(complete_len);
        let (residue, frames) = decode(&self.buffer, head)?;
        self.pending = tail.to_vec();
        self.buffer = residue;
        self.enforce_bound();
        Ok(frames)
    }

    /// Unmatched text currently held.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Total bytes dropped by the buffer bound since creation.
    pub fn discarded_bytes(&self) -> usize {
        self.discarded
    }

    fn enforce_bound(&mut self) {
        if self.buffer.len() <= self.max_buffer_len {
            return;
        }

        let before = self.buffer.len();
        match self.buffer.rfind(FRAME_START) {
            Some(idx) => {
                self.buffer.drain(..idx);
            }
            None => self.buffer.clear(),
        }
        if self.buffer.len() > self.max_buffer_len {
            self.buffer.clear();
        }

        let dropped = before - self.buffer.len();
        self.discarded += dropped;
        warn!(
            dropped,
            limit = self.max_buffer_len,
            "decode buffer over limit; discarded unmatched prefix"
        );
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_LEN)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(frames: &[RawFrame]) -> Vec<&str> {
        frames.iter().map(RawFrame::as_str).collect()
    }

    // ── extract_frames ────────────────────────────────────────────────────────

    #[test]
    fn test_extract_single_frame_leaves_empty_residue() {
        let (rest, frames) = extract_frames("S+1:-1:0E");
        assert_eq!(rest, "");
        assert_eq!(texts(&frames), vec!["S+1:-1:0E"]);
    }

    #[test]
    fn test_extract_frames_interleaved_with_garbage_keeps_garbage_in_order() {
        // Arrange
        let buffer = "abS+1:+2:0EcdS-3:-4:1Eef";

        // Act
        let (rest, frames) = extract_frames(buffer);

        // Assert
        assert_eq!(texts(&frames), vec!["S+1:+2:0E", "S-3:-4:1E"]);
        assert_eq!(rest, "abcdef");
    }

    #[test]
    fn test_extract_keeps_incomplete_trailing_frame() {
        let (rest, frames) = extract_frames("S+1:+2:0ES+5:");
        assert_eq!(texts(&frames), vec!["S+1:+2:0E"]);
        assert_eq!(rest, "S+5:");
    }

    #[test]
    fn test_extract_ignores_field_count_and_returns_both_schemas() {
        let (rest, frames) = extract_frames("S+10:-5:1EjunkS+0:+0:0:1:0E");
        assert_eq!(texts(&frames), vec!["S+10:-5:1E", "S+0:+0:0:1:0E"]);
        assert_eq!(rest, "junk");
    }

    #[test]
    fn test_extract_rejects_sign_without_digits() {
        let (rest, frames) = extract_frames("S+:1:0E");
        assert!(frames.is_empty());
        assert_eq!(rest, "S+:1:0E");
    }

    #[test]
    fn test_extract_recovers_after_false_start() {
        // The first `S` never completes; the scanner must find the second one.
        let (rest, frames) = extract_frames("S+1:xS+2:+3:1E");
        assert_eq!(texts(&frames), vec!["S+2:+3:1E"]);
        assert_eq!(rest, "S+1:x");
    }

    #[test]
    fn test_extract_handles_non_ascii_garbage() {
        let (rest, frames) = extract_frames("°S+1:+1:1Eé");
        assert_eq!(texts(&frames), vec!["S+1:+1:1E"]);
        assert_eq!(rest, "°é");
    }

    #[test]
    fn test_extract_empty_buffer() {
        let (rest, frames) = extract_frames("");
        assert!(rest.is_empty());
        assert!(frames.is_empty());
    }

    // ── decode ────────────────────────────────────────────────────────────────

    #[test]
    fn test_decode_joins_buffer_and_new_bytes() {
        let (rest, frames) = decode("S+1:", b"+2:0E").unwrap();
        assert_eq!(texts(&frames), vec!["S+1:+2:0E"]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_decode_invalid_utf8_is_decode_error() {
        let err = decode("", &[b'S', 0xFF, b'E']).unwrap_err();
        assert_eq!(err, DecodeError::InvalidUtf8 { valid_up_to: 1 });
    }

    // ── FrameDecoder ──────────────────────────────────────────────────────────

    #[test]
    fn test_decoder_completes_frame_across_pushes() {
        // Arrange
        let mut decoder = FrameDecoder::default();

        // Act
        let first = decoder.push(b"S+1:-").unwrap();
        let second = decoder.push(b"2:1E").unwrap();

        // Assert
        assert!(first.is_empty());
        assert_eq!(texts(&second), vec!["S+1:-2:1E"]);
        assert_eq!(decoder.buffered(), "");
    }

    #[test]
    fn test_decoder_holds_back_split_utf8_sequence() {
        let mut decoder = FrameDecoder::default();
        let bytes = "é".as_bytes();

        // First half of a two-byte sequence is not an error.
        assert!(decoder.push(&bytes[..1]).unwrap().is_empty());
        decoder.push(&bytes[1..]).unwrap();

        assert_eq!(decoder.buffered(), "é");
    }

    #[test]
    fn test_decoder_rejects_invalid_byte() {
        let mut decoder = FrameDecoder::default();
        assert!(decoder.push(&[0xC3, 0x28]).is_err());
    }

    #[test]
    fn test_decoder_trims_to_last_start_marker_when_over_limit() {
        // Arrange
        let mut decoder = FrameDecoder::new(8);

        // Act
        decoder.push(b"noise-noise-S+4:").unwrap();

        // Assert
        assert_eq!(decoder.buffered(), "S+4:");
        assert_eq!(decoder.discarded_bytes(), 12);

        // The kept tail can still complete.
        let frames = decoder.push(b"+4:0E").unwrap();
        assert_eq!(texts(&frames), vec!["S+4:+4:0E"]);
    }

    #[test]
    fn test_decoder_clears_residue_without_start_marker() {
        let mut decoder = FrameDecoder::new(4);
        decoder.push(b"garbage!").unwrap();
        assert_eq!(decoder.buffered(), "");
        assert_eq!(decoder.discarded_bytes(), 8);
    }

    #[test]
    fn test_decoder_clears_overlong_tail() {
        let mut decoder = FrameDecoder::new(4);
        decoder.push(b"S+123456789").unwrap();
        assert_eq!(decoder.buffered(), "");
    }
}
