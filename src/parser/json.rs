// SPDX-License-Identifier: Apache-2.0

use serde_json::{Value, json};

use super::{LineParser, ParseFailKind, ParseResult};

/// Parses each line as a JSON object.
///
/// Strict by default: a line that is not a JSON object is reported as a
/// parse failure. Lenient mode degrades such lines to a plain
/// `{"line": ...}` record instead, so a mixed-format stream keeps flowing.
#[derive(Debug, Clone, Default)]
pub struct JsonParser {
    lenient: bool,
}

impl JsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lenient parser that falls back to a plain record on parse failure.
    pub fn lenient() -> Self {
        Self { lenient: true }
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    fn fail_or_fallback(&self, line: &[u8], text: Option<&str>) -> ParseResult {
        match (self.lenient, text) {
            (true, Some(t)) => ParseResult::Record(json!({ "line": t })),
            _ => ParseResult::Failed {
                kind: if text.is_some() {
                    ParseFailKind::Syntax
                } else {
                    ParseFailKind::Utf8
                },
                raw: line.to_vec(),
            },
        }
    }
}

impl LineParser for JsonParser {
    fn parse_line(&mut self, line: &[u8]) -> ParseResult {
        let text = match std::str::from_utf8(line) {
            Ok(t) => t,
            Err(_) => return self.fail_or_fallback(line, None),
        };

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => ParseResult::Record(Value::Object(map)),
            _ => self.fail_or_fallback(line, Some(text)),
        }
    }
}
