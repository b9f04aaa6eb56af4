//! Frame Protocol
//!
//! Wire format for generation streams: server-sent-event style lines, one
//! JSON payload per frame.
//!
//! # Frame Format
//!
//! ```text
//! data: {"step":"final","content":"word "}\n
//! \n
//! ```
//!
//! Each frame is parsed independently. Lines that are blank, carry other SSE
//! fields, or fail to parse are skipped without aborting the stream.
//!
//! # Buffering
//!
//! Network reads split frames at arbitrary byte positions, including inside
//! multi-byte UTF-8 sequences. The decoder buffers raw bytes and only
//! interprets complete lines, so split frames are reassembled, never dropped.

use thiserror::Error;
use tracing::debug;

use crate::events::StreamEvent;

/// Maximum size of a single line (1 MB)
///
/// A line longer than this without a newline is discarded.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Field prefix of a payload line
const DATA_PREFIX: &[u8] = b"data:";

/// Errors produced while encoding frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// JSON serialization failed
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload exceeds `MAX_FRAME_SIZE`
    #[error("Frame too large: {len} bytes (max: {max})")]
    TooLarge {
        /// Payload size
        len: usize,
        /// Limit
        max: usize,
    },
}

/// Serialize the JSON payload of a frame (without the `data:` prefix)
///
/// # Errors
///
/// Returns `FrameError` if serialization fails or the payload exceeds
/// `MAX_FRAME_SIZE`.
pub fn encode_payload(event: &StreamEvent) -> Result<String, FrameError> {
    let json = serde_json::to_string(event)?;
    if json.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            len: json.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(json)
}

/// Encode an event as a complete `data: <json>\n\n` frame
///
/// # Errors
///
/// See [`encode_payload`].
pub fn encode(event: &StreamEvent) -> Result<String, FrameError> {
    Ok(format!("data: {}\n\n", encode_payload(event)?))
}

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming bytes and yields complete events.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Lines that looked like payloads but failed to parse
    skipped: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            skipped: 0,
        }
    }

    /// Append bytes to the buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Get the number of bytes available in the buffer
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Number of malformed frames skipped so far
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Try to decode the next event
    ///
    /// Returns `None` when more data is needed.
    pub fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let pending = &self.buffer[self.read_pos..];
            let Some(newline) = pending.iter().position(|&b| b == b'\n') else {
                if pending.len() > MAX_FRAME_SIZE {
                    debug!(bytes = pending.len(), "Discarding oversized partial frame");
                    self.skipped += 1;
                    self.clear();
                }
                return None;
            };

            let line_start = self.read_pos;
            self.read_pos += newline + 1;
            if let Some(event) = self.parse_line(line_start, line_start + newline) {
                return Some(event);
            }
        }
    }

    /// Flush a trailing line that was never newline-terminated
    ///
    /// Call once the byte stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if let Some(event) = self.next_event() {
            return Some(event);
        }
        let (start, end) = (self.read_pos, self.buffer.len());
        self.read_pos = end;
        let event = self.parse_line(start, end);
        self.clear();
        event
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }

    fn parse_line(&mut self, start: usize, end: usize) -> Option<StreamEvent> {
        let mut line = &self.buffer[start..end];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(b" ").unwrap_or(payload);

        match serde_json::from_slice::<StreamEvent>(payload) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!(error = %e, bytes = payload.len(), "Skipping malformed frame");
                self.skipped += 1;
                None
            }
        }
    }
}
