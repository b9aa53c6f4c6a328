// SPDX-License-Identifier: Apache-2.0

//! One open handle plus the read cursor and line framing for it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::follower::config::StartPolicy;
use crate::identity::FileIdentity;
use crate::line_buffer::LineBuffer;

const READ_CHUNK: usize = 8192;

/// Reads a single file incrementally through one handle.
///
/// The handle is kept open across rotation so bytes still reachable through
/// the old identity can be drained after the path has moved on. The cursor
/// is advanced only after a successful read; it is reset by [`rewind`] on
/// truncation.
///
/// [`rewind`]: TailReader::rewind
pub struct TailReader {
    file: File,
    identity: FileIdentity,
    offset: u64,
    buffer: LineBuffer,
}

impl TailReader {
    /// Open `path` and position the cursor per the start policy.
    pub fn open(
        path: &Path,
        start: StartPolicy,
        max_tail_scan: u64,
        max_line_bytes: usize,
    ) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let identity = FileIdentity::from_file(&file)?;

        let offset = match start {
            StartPolicy::FromStart => 0,
            StartPolicy::FromEnd => file.metadata()?.len(),
            StartPolicy::TailLines(n) => tail_offset(&mut file, n, max_tail_scan)?,
        };

        Ok(Self {
            file,
            identity,
            offset,
            buffer: LineBuffer::new(max_line_bytes),
        })
    }

    /// Open the file newly present at `path` after a rotation, from its
    /// start.
    pub fn reopen(path: &Path, max_line_bytes: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        let identity = FileIdentity::from_file(&file)?;

        Ok(Self {
            file,
            identity,
            offset: 0,
            buffer: LineBuffer::new(max_line_bytes),
        })
    }

    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length currently reachable through the open handle. Valid even after
    /// the file was renamed or unlinked.
    pub fn handle_len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Truncation rewind: back to offset zero on the same handle. The
    /// retained fragment belongs to overwritten content and is dropped.
    pub fn rewind(&mut self) {
        self.offset = 0;
        self.buffer.clear();
    }

    /// Read everything available past the cursor, feeding complete lines to
    /// `on_line` in order. A partial read is not an error; it simply yields
    /// fewer or zero lines until more bytes are appended.
    ///
    /// Returns `false` if `on_line` asked to stop early.
    pub fn read_lines(&mut self, on_line: &mut dyn FnMut(Vec<u8>) -> bool) -> io::Result<bool> {
        self.file.seek(SeekFrom::Start(self.offset))?;

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = match self.file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.offset += n as u64;

            for line in self.buffer.feed(&chunk[..n]) {
                if !on_line(line) {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Hand out the unterminated fragment. Called when the stream over this
    /// handle is ending for good (rotation drain complete), where no future
    /// append can complete the line.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        self.buffer.flush_remainder()
    }
}

/// Compute the byte offset of the start of the last `n` lines by scanning
/// backwards from the end, reading at most `max_scan` bytes.
///
/// If the scan cap is reached before `n` line starts are found, the
/// earliest line boundary inside the scanned window is used, so the first
/// emitted line is never a mid-line fragment.
fn tail_offset(file: &mut File, n: usize, max_scan: u64) -> io::Result<u64> {
    let len = file.metadata()?.len();
    if n == 0 {
        return Ok(len);
    }

    let scan = len.min(max_scan.max(1));
    let scan_start = len - scan;

    let mut chunk = vec![0u8; READ_CHUNK.min(scan as usize)];
    let mut pos = len;
    let mut newlines = 0usize;
    let mut earliest_boundary: Option<u64> = None;

    while pos > scan_start {
        let read_len = (chunk.len() as u64).min(pos - scan_start) as usize;
        let read_from = pos - read_len as u64;
        file.seek(SeekFrom::Start(read_from))?;
        file.read_exact(&mut chunk[..read_len])?;

        for i in (0..read_len).rev() {
            if chunk[i] != b'\n' {
                continue;
            }
            let abs = read_from + i as u64;
            if abs == len - 1 {
                // terminator of the final line, not a boundary before it
                continue;
            }
            earliest_boundary = Some(abs + 1);
            newlines += 1;
            if newlines == n {
                return Ok(abs + 1);
            }
        }

        pos = read_from;
    }

    if scan == len {
        // scanned the whole file: fewer than n lines exist
        Ok(0)
    } else {
        Ok(earliest_boundary.unwrap_or(len))
    }
}
