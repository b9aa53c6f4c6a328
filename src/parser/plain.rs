// SPDX-License-Identifier: Apache-2.0

use serde_json::json;

use super::{LineParser, ParseFailKind, ParseResult};

/// Wraps each line in a `{line, line_number, path}` record.
///
/// `line_number` is 1-based and counts every line the parser sees,
/// including ones that fail to decode.
#[derive(Debug, Clone, Default)]
pub struct PlainParser {
    path: Option<String>,
    line_number: u64,
}

impl PlainParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the source path in each record.
    pub fn with_path(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.path = Some(path.as_ref().display().to_string());
        self
    }
}

impl LineParser for PlainParser {
    fn parse_line(&mut self, line: &[u8]) -> ParseResult {
        self.line_number += 1;

        let text = match std::str::from_utf8(line) {
            Ok(t) => t,
            Err(_) => {
                return ParseResult::Failed {
                    kind: ParseFailKind::Utf8,
                    raw: line.to_vec(),
                };
            }
        };

        let mut record = json!({
            "line": text,
            "line_number": self.line_number,
        });
        if let Some(ref path) = self.path {
            record["path"] = json!(path);
        }

        ParseResult::Record(record)
    }
}
