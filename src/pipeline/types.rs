use serde::{Deserialize, Serialize};

use crate::models::Part;

/// Parts produced by one extractor run plus the diagnostics that go with them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub parts: Vec<Part>,
    pub errors: Vec<ParseIssue>,
    pub warnings: Vec<String>,
    pub stats: ParseStats,
}

/// A line, row or item that did not become a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseIssue {
    /// 1-based line, row or item number in the original input.
    pub line: usize,
    pub text: String,
    pub message: String,
}

/// Batch counters. `parsed_lines + failed_lines == total_lines` and
/// `total_pieces` is the sum of `qty` over the produced parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseStats {
    pub total_lines: usize,
    pub parsed_lines: usize,
    pub failed_lines: usize,
    pub total_pieces: u64,
}

impl ParseOutcome {
    /// Outcome for input that was rejected before any line was examined.
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            errors: vec![ParseIssue {
                line: 0,
                text: String::new(),
                message,
            }],
            ..Self::default()
        }
    }

    pub fn push_part(&mut self, part: Part) {
        self.stats.total_lines += 1;
        self.stats.parsed_lines += 1;
        self.stats.total_pieces += u64::from(part.qty);
        self.parts.push(part);
    }

    pub fn push_failure(&mut self, line: usize, text: &str, message: impl Into<String>) {
        self.stats.total_lines += 1;
        self.stats.failed_lines += 1;
        self.errors.push(ParseIssue {
            line,
            text: text.to_string(),
            message: message.into(),
        });
    }
}
