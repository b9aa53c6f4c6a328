// SPDX-License-Identifier: Apache-2.0

//! The parser seam between line framing and record emission.
//!
//! A parser turns one raw line into a structured record, or reports why it
//! could not. The follower is indifferent to which happens: both variants
//! are forwarded to the consumer in line order, so a malformed or
//! non-UTF-8 line is never silently dropped.

mod json;
mod plain;

pub use json::JsonParser;
pub use plain::PlainParser;

/// Why a line failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailKind {
    /// Line is not valid UTF-8.
    Utf8,
    /// Line decoded but did not match the expected format.
    Syntax,
}

/// Outcome of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// Structured record extracted from the line.
    Record(serde_json::Value),
    /// The line could not be parsed; the raw bytes are preserved.
    Failed {
        kind: ParseFailKind,
        raw: Vec<u8>,
    },
}

impl ParseResult {
    pub fn is_record(&self) -> bool {
        matches!(self, ParseResult::Record(_))
    }

    /// The record, if parsing succeeded.
    pub fn record(&self) -> Option<&serde_json::Value> {
        match self {
            ParseResult::Record(v) => Some(v),
            ParseResult::Failed { .. } => None,
        }
    }
}

/// Turns raw lines into structured records.
///
/// `&mut self` admits stateful parsers (line numbering, multi-line formats)
/// without any shared state across calls; the follower owns its parser on
/// one thread.
pub trait LineParser: Send {
    fn parse_line(&mut self, line: &[u8]) -> ParseResult;
}

impl<F> LineParser for F
where
    F: FnMut(&[u8]) -> ParseResult + Send,
{
    fn parse_line(&mut self, line: &[u8]) -> ParseResult {
        self(line)
    }
}
