//! Delimited-text reader and the spreadsheet decoder seam.

use serde::{Deserialize, Serialize};

use super::TabularError;

/// Delimiters tried during detection, in tie-break order.
pub const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '\t', '|'];

/// Lines sampled for delimiter detection.
const SAMPLE_LINES: usize = 5;

/// Decoded table: header row plus data rows, cells as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Turns spreadsheet file bytes (xlsx, ods, ...) into a `TableData`.
/// The tabular parser owns everything after decoding.
pub trait WorkbookDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<TableData, TabularError>;
}

/// Decoder for CSV/TSV bytes only.
pub struct DelimitedDecoder;

impl WorkbookDecoder for DelimitedDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<TableData, TabularError> {
        parse_delimited_bytes(bytes)
    }
}

/// Parse UTF-8 delimited bytes.
pub fn parse_delimited_bytes(bytes: &[u8]) -> Result<TableData, TabularError> {
    let text = std::str::from_utf8(bytes)?;
    parse_delimited(text)
}

/// Parse delimited text: strips a UTF-8 BOM, detects the delimiter, honours
/// double-quoted fields (with `""` escapes and embedded newlines). The first
/// record is the header row.
pub fn parse_delimited(text: &str) -> Result<TableData, TabularError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = detect_delimiter(text);
    let mut records = parse_records(text, delimiter).into_iter();

    let headers: Vec<String> = records
        .find(|r| r.iter().any(|c| !c.trim().is_empty()))
        .ok_or(TabularError::Empty)?
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();
    let rows: Vec<Vec<String>> = records.collect();

    tracing::debug!(
        delimiter = %delimiter.escape_default(),
        columns = headers.len(),
        rows = rows.len(),
        "Delimited table read"
    );
    Ok(TableData { headers, rows })
}

/// Pick the candidate that appears the same non-zero number of times on
/// every sampled line; otherwise the most frequent one; otherwise a comma.
pub fn detect_delimiter(text: &str) -> char {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect();
    if sample.is_empty() {
        return ',';
    }

    let counts: Vec<(char, Vec<usize>)> = DELIMITER_CANDIDATES
        .iter()
        .map(|&d| (d, sample.iter().map(|l| count_unquoted(l, d)).collect()))
        .collect();

    let consistent = counts
        .iter()
        .filter(|(_, per_line)| per_line[0] > 0 && per_line.iter().all(|c| *c == per_line[0]))
        .max_by_key(|(_, per_line)| per_line[0]);
    if let Some((delimiter, _)) = consistent {
        return *delimiter;
    }

    counts
        .iter()
        .map(|(d, per_line)| (*d, per_line.iter().sum::<usize>()))
        .filter(|(_, total)| *total > 0)
        .max_by_key(|(_, total)| *total)
        .map(|(d, _)| d)
        .unwrap_or(',')
}

fn count_unquoted(line: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Split text into records of fields.
fn parse_records(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            other => field.push(other),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}
