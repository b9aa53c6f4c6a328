// SPDX-License-Identifier: Apache-2.0

//! Byte-exact line framing across read boundaries.
//!
//! Raw bytes are fed in whatever chunks the reads produce; complete lines
//! come out in the order their terminators were observed, and an
//! unterminated suffix is retained until a later feed completes it. Under
//! live-follow semantics the trailing fragment is expected to be completed
//! by a future append, so it is only surfaced through an explicit
//! [`LineBuffer::flush_remainder`] at end of stream.

/// Default cap on an unterminated run before it is yielded in chunks.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Accumulates raw bytes and yields complete lines.
///
/// Handles both `\n` and `\r\n` endings, stripping exactly the terminator.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    /// Create a buffer. An unterminated run longer than `max_line_bytes` is
    /// yielded as full-size chunks rather than growing without bound; no
    /// byte is dropped either way.
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    /// Feed a chunk of raw bytes, returning the complete lines it finishes.
    ///
    /// Lines are emitted strictly in terminator order. The returned lines
    /// have their terminator stripped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        // Only the appended region can contain a new '\n'; a '\r' left at
        // the end of the old fragment is handled by the end-1 check below.
        let scan_from = self.pending.len();
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        for i in scan_from..self.pending.len() {
            if self.pending[i] == b'\n' {
                let mut end = i;
                if end > start && self.pending[end - 1] == b'\r' {
                    end -= 1;
                }
                lines.push(self.pending[start..end].to_vec());
                start = i + 1;
            }
        }

        if start > 0 {
            self.pending.drain(..start);
        }

        // Oversize guard: a writer that never emits a newline must not grow
        // the fragment indefinitely.
        while self.pending.len() >= self.max_line_bytes {
            let mut cut = self.max_line_bytes;
            // keep a trailing '\r' with the '\n' that may follow it, so a
            // CRLF pair is never split across a chunk boundary
            if cut > 1 && self.pending[cut - 1] == b'\r' {
                cut -= 1;
            }
            let chunk: Vec<u8> = self.pending.drain(..cut).collect();
            lines.push(chunk);
        }

        lines
    }

    /// Return the retained fragment as a final unterminated line.
    ///
    /// Only meaningful at end of stream; a live follower keeps the fragment
    /// instead, since a future append is expected to complete it.
    pub fn flush_remainder(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Discard the retained fragment. Used on truncation rewind, where the
    /// fragment belongs to overwritten content.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of retained (unterminated) bytes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
