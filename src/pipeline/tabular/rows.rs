use serde::{Deserialize, Serialize};

use super::delimited::{parse_delimited, TableData, WorkbookDecoder};
use super::headers::{detect_columns, ColumnField, ColumnMapping};
use super::TabularError;
use crate::models::{EdgeId, Grain, Part, SourceMethod, DEFAULT_THICKNESS_MM, THICKNESS_ACCEPT_RANGE_MM};
use crate::pipeline::patterns::{MATERIAL_KEYWORDS, MAX_LABEL_LEN};
use crate::pipeline::primitives::{
    are_dimensions_reasonable, calculate_confidence, find_material_match, parse_dimension_value,
    parse_edges, tidy, truncate_label, ConfidenceFlags,
};
use crate::pipeline::remote::RemoteSource;
use crate::pipeline::types::ParseOutcome;

/// Options for spreadsheet and delimited-text import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularOptions {
    pub default_thickness_mm: f64,
    pub default_material_id: Option<String>,
    pub allow_rotation_default: bool,
    /// Rows with neither length nor width are dropped silently.
    pub skip_blank_rows: bool,
    /// Explicit mapping; header detection runs when absent.
    pub mapping: Option<ColumnMapping>,
}

impl Default for TabularOptions {
    fn default() -> Self {
        Self {
            default_thickness_mm: DEFAULT_THICKNESS_MM,
            default_material_id: None,
            allow_rotation_default: true,
            skip_blank_rows: true,
            mapping: None,
        }
    }
}

/// Parse delimited text (CSV, TSV, semicolon, pipe).
pub fn parse_delimited_text(text: &str, options: &TabularOptions) -> ParseOutcome {
    match parse_delimited(text) {
        Ok(table) => parse_table(&table, options),
        Err(e) => reject(e),
    }
}

/// Decode spreadsheet bytes through `decoder`, then map rows.
pub fn parse_workbook(
    bytes: &[u8],
    decoder: &dyn WorkbookDecoder,
    options: &TabularOptions,
) -> ParseOutcome {
    match decoder.decode(bytes) {
        Ok(table) => parse_table(&table, options),
        Err(e) => reject(e),
    }
}

/// Fetch a file from `url` and parse it as a workbook.
pub fn parse_remote(
    source: &dyn RemoteSource,
    url: &str,
    decoder: &dyn WorkbookDecoder,
    options: &TabularOptions,
) -> ParseOutcome {
    match source.fetch_bytes(url) {
        Ok(bytes) => parse_workbook(&bytes, decoder, options),
        Err(e) => reject(TabularError::from(e)),
    }
}

fn reject(error: TabularError) -> ParseOutcome {
    tracing::warn!(error = %error, "Table rejected");
    ParseOutcome::rejected(error.to_string())
}

fn resolve_mapping(table: &TableData, options: &TabularOptions) -> Result<ColumnMapping, TabularError> {
    let mapping = match &options.mapping {
        Some(explicit) => explicit.clone(),
        None => detect_columns(&table.headers),
    };
    let missing = mapping.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|f| f.as_str()).collect();
        return Err(TabularError::InvalidMapping(names.join(", ")));
    }
    Ok(mapping)
}

/// Map every data row of a decoded table to a part. An unresolved length or
/// width column rejects the table before any row is read.
pub fn parse_table(table: &TableData, options: &TabularOptions) -> ParseOutcome {
    let mapping = match resolve_mapping(table, options) {
        Ok(m) => m,
        Err(e) => return reject(e),
    };

    let mut outcome = ParseOutcome::default();
    for (idx, row) in table.rows.iter().enumerate() {
        // Header is spreadsheet row 1.
        let row_no = idx + 2;
        match map_row(row, &mapping, options) {
            RowResult::Part(mut part) => {
                part.audit.source_ref = Some(format!("row:{row_no}"));
                outcome.push_part(*part);
            }
            RowResult::Blank if options.skip_blank_rows => {}
            RowResult::Blank => outcome.push_failure(row_no, &row.join(", "), "Blank row"),
            RowResult::Error(message) => {
                tracing::debug!(row = row_no, reason = %message, "Row not parsed");
                outcome.push_failure(row_no, &row.join(", "), message);
            }
        }
    }

    tracing::info!(
        rows = table.rows.len(),
        parsed = outcome.stats.parsed_lines,
        failed = outcome.stats.failed_lines,
        pieces = outcome.stats.total_pieces,
        "Table parse complete"
    );
    outcome
}

enum RowResult {
    Part(Box<Part>),
    Blank,
    Error(String),
}

fn map_row(row: &[String], mapping: &ColumnMapping, options: &TabularOptions) -> RowResult {
    let cell = |field: ColumnField| {
        mapping
            .get(field)
            .and_then(|c| row.get(c))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    };
    let dimension = |field: ColumnField| {
        cell(field)
            .and_then(|s| coerce_dimension(s, mapping.factor(field)))
            .filter(|v| *v > 0.0)
    };

    let (l, w) = match (dimension(ColumnField::Length), dimension(ColumnField::Width)) {
        (Some(l), Some(w)) => (l, w),
        (None, None) => return RowResult::Blank,
        (None, Some(_)) => return RowResult::Error("Missing length".into()),
        (Some(_), None) => return RowResult::Error("Missing width".into()),
    };

    let qty = cell(ColumnField::Quantity)
        .and_then(coerce_number)
        .map(|q| q.round().clamp(1.0, f64::from(u32::MAX)) as u32);

    let (t_min, t_max) = THICKNESS_ACCEPT_RANGE_MM;
    let thickness = cell(ColumnField::Thickness)
        .and_then(coerce_number)
        .filter(|t| (t_min..=t_max).contains(t));

    let material = cell(ColumnField::Material).map(|m| {
        find_material_match(m, MATERIAL_KEYWORDS)
            .map(|hit| hit.material_id.to_string())
            .unwrap_or_else(|| m.to_string())
    });

    let grain = cell(ColumnField::Grain).map(parse_grain_value).unwrap_or_default();
    let rotation = cell(ColumnField::Rotation).and_then(parse_yes_no);

    let mut part = Part::new(l, w, SourceMethod::Tabular);
    part.qty = qty.unwrap_or(1);
    part.thickness_mm = thickness.unwrap_or(options.default_thickness_mm);
    part.material_id = material
        .clone()
        .or_else(|| options.default_material_id.clone())
        .unwrap_or_default();
    part.label = cell(ColumnField::Label).map(|s| truncate_label(&tidy(s), MAX_LABEL_LEN));
    part.group_id = cell(ColumnField::Group).map(str::to_string);
    part.set_orientation(
        grain,
        rotation == Some(false),
        rotation.unwrap_or(options.allow_rotation_default),
    );
    if let Some(edging) = cell(ColumnField::Edging) {
        part.set_edges(&parse_edge_cell(edging));
    }
    part.raw_text = Some(row.join(" | "));

    let flags = ConfidenceFlags {
        has_dimensions: true,
        has_quantity: qty.is_some(),
        has_label: part.label.is_some(),
        has_material: material.is_some(),
        has_thickness: thickness.is_some(),
        dimensions_reasonable: are_dimensions_reasonable(l, w),
    };
    part.set_confidence(calculate_confidence(&flags));
    RowResult::Part(Box::new(part))
}

/// Strip everything but digits and separators, then parse. A single comma
/// followed by at most two digits is a decimal comma; other commas are
/// thousands separators. A leading minus sign is kept.
pub fn coerce_number(cell: &str) -> Option<f64> {
    let negative = cell.trim_start().starts_with('-');
    let kept: String = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let decimal_comma = !kept.contains('.')
        && kept.matches(',').count() == 1
        && kept.split(',').nth(1).is_some_and(|d| !d.is_empty() && d.len() <= 2);
    let cleaned = if decimal_comma {
        kept.replace(',', ".")
    } else {
        kept.replace(',', "")
    };
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| if negative { -v } else { v })
}

/// A unit written in the cell ("72cm") wins over the column's unit.
fn coerce_dimension(cell: &str, column_factor: f64) -> Option<f64> {
    let has_unit = cell.trim_end().ends_with(|c: char| c.is_alphabetic() || c == '"');
    if has_unit {
        if let Some(mm) = parse_dimension_value(cell) {
            return Some(mm);
        }
    }
    coerce_number(cell).map(|v| v * column_factor)
}

/// Grain cell values: "L", "length", "along_l", "GL" and the width forms.
pub fn parse_grain_value(cell: &str) -> Grain {
    match cell.trim().to_lowercase().as_str() {
        "l" | "len" | "length" | "along_l" | "along l" | "gl" | "long" | "lengthwise" | "vertical" => {
            Grain::AlongLength
        }
        "w" | "wid" | "width" | "along_w" | "along w" | "gw" | "across" | "widthwise" | "horizontal" => {
            Grain::AlongWidth
        }
        _ => Grain::None,
    }
}

/// Rotation cell values. `None` for anything not clearly yes or no.
pub fn parse_yes_no(cell: &str) -> Option<bool> {
    match cell.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "allow" | "allowed" | "ok" | "x" => Some(true),
        "n" | "no" | "false" | "0" | "fixed" | "no rotate" | "no rotation" | "locked" => Some(false),
        _ => None,
    }
}

/// Edge cell: explicit codes and phrases, or a plain yes meaning all four.
fn parse_edge_cell(cell: &str) -> Vec<EdgeId> {
    let lower = cell.trim().to_lowercase();
    if matches!(lower.as_str(), "all" | "y" | "yes" | "4") {
        return EdgeId::ALL.to_vec();
    }
    parse_edges(&lower.replace([',', ';', '/'], " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::remote::{MockRemoteSource, RemoteError};
    use crate::pipeline::tabular::DelimitedDecoder;

    fn table(headers: &[&str], rows: &[&[&str]]) -> TableData {
        TableData {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn rows_map_to_parts() {
        let t = table(
            &["Name", "L (mm)", "W (mm)", "Qty", "Material", "Grain"],
            &[&["Side", "720", "560", "2", "white melamine", "L"]],
        );
        let outcome = parse_table(&t, &TabularOptions::default());
        assert_eq!(outcome.parts.len(), 1);
        let part = &outcome.parts[0];
        assert_eq!(part.label.as_deref(), Some("Side"));
        assert_eq!((part.size.l, part.size.w), (720.0, 560.0));
        assert_eq!(part.qty, 2);
        assert_eq!(part.material_id, "MEL-WHT");
        assert_eq!(part.grain, Grain::AlongLength);
        assert!(!part.allow_rotation);
        assert_eq!(part.audit.source_method, SourceMethod::Tabular);
        assert_eq!(part.audit.source_ref.as_deref(), Some("row:2"));
    }

    #[test]
    fn missing_width_column_processes_no_rows() {
        let t = table(&["Name", "L (mm)", "Qty"], &[&["Side", "720", "2"]]);
        let outcome = parse_table(&t, &TabularOptions::default());
        assert!(outcome.parts.is_empty());
        assert_eq!(outcome.stats.total_lines, 0);
        assert!(outcome.errors[0].message.contains("width"), "got {}", outcome.errors[0].message);
    }

    #[test]
    fn blank_and_partial_rows() {
        let t = table(
            &["L", "W"],
            &[&["600", "300"], &["", ""], &["600", ""], &["0", "0"], &["", "400"]],
        );
        let outcome = parse_table(&t, &TabularOptions::default());
        assert_eq!(outcome.stats.parsed_lines, 1);
        assert_eq!(outcome.stats.failed_lines, 2);
        assert_eq!(outcome.errors[0].line, 4);
        assert_eq!(outcome.errors[0].message, "Missing width");
        assert_eq!(outcome.errors[1].message, "Missing length");
    }

    #[test]
    fn blank_rows_can_be_reported() {
        let options = TabularOptions {
            skip_blank_rows: false,
            ..TabularOptions::default()
        };
        let t = table(&["L", "W"], &[&["", ""]]);
        let outcome = parse_table(&t, &options);
        assert_eq!(outcome.errors[0].message, "Blank row");
    }

    #[test]
    fn quantity_is_rounded_and_floored() {
        let t = table(&["L", "W", "Qty"], &[&["600", "300", "2.6"], &["600", "300", "0"]]);
        let outcome = parse_table(&t, &TabularOptions::default());
        assert_eq!(outcome.parts[0].qty, 3);
        assert_eq!(outcome.parts[1].qty, 1);
        assert_eq!(outcome.stats.total_pieces, 4);
    }

    #[test]
    fn numeric_coercion_strips_noise() {
        assert_eq!(coerce_number("720 mm"), Some(720.0));
        assert_eq!(coerce_number("1,200"), Some(1200.0));
        assert_eq!(coerce_number("72,5"), Some(72.5));
        assert_eq!(coerce_number("abc"), None);
        assert_eq!(coerce_number(" -720"), Some(-720.0));
        assert_eq!(coerce_number("-"), None);
    }

    #[test]
    fn negative_cells_are_not_dimensions() {
        let t = table(&["L", "W"], &[&["-720", "560"], &["600", "-300mm"], &["600", "300"]]);
        let outcome = parse_table(&t, &TabularOptions::default());
        assert_eq!(outcome.parts.len(), 1);
        assert_eq!(outcome.parts[0].size.l, 600.0);
        assert_eq!(outcome.errors[0].message, "Missing length");
        assert_eq!(outcome.errors[1].message, "Missing width");
    }

    #[test]
    fn cell_units_and_column_units() {
        let t = table(&["Length (cm)", "Width (cm)"], &[&["72", "560mm"]]);
        let outcome = parse_table(&t, &TabularOptions::default());
        let part = &outcome.parts[0];
        assert_eq!((part.size.l, part.size.w), (720.0, 560.0));
    }

    #[test]
    fn rotation_words_follow_forcing_rule() {
        let t = table(
            &["L", "W", "Grain", "Rotate"],
            &[&["600", "300", "", "no"], &["600", "300", "W", "yes"], &["600", "300", "", "yes"]],
        );
        let outcome = parse_table(&t, &TabularOptions::default());
        assert!(!outcome.parts[0].allow_rotation);
        assert!(!outcome.parts[1].allow_rotation, "explicit grain must pin rotation");
        assert_eq!(outcome.parts[1].grain, Grain::AlongWidth);
        assert!(outcome.parts[2].allow_rotation);
    }

    #[test]
    fn edge_and_group_columns() {
        let t = table(
            &["L", "W", "Edges", "Cabinet"],
            &[&["600", "300", "L1, W2", "Base 1"], &["600", "300", "all", ""]],
        );
        let outcome = parse_table(&t, &TabularOptions::default());
        assert_eq!(outcome.parts[0].edge_codes(), ["L1", "W2"]);
        assert_eq!(outcome.parts[0].group_id.as_deref(), Some("Base 1"));
        assert_eq!(outcome.parts[1].edge_codes().len(), 4);
    }

    #[test]
    fn explicit_mapping_overrides_detection() {
        let mut mapping = ColumnMapping::default();
        mapping.set(ColumnField::Length, 0);
        mapping.set(ColumnField::Width, 1);
        let options = TabularOptions {
            mapping: Some(mapping),
            ..TabularOptions::default()
        };
        let t = table(&["A", "B"], &[&["600", "300"]]);
        let outcome = parse_table(&t, &options);
        assert_eq!(outcome.parts.len(), 1);
    }

    #[test]
    fn delimited_text_end_to_end() {
        let csv = "Name;L;W;Qty\nDoor;720;400;2\nShelf;600;300;3\n";
        let outcome = parse_delimited_text(csv, &TabularOptions::default());
        assert_eq!(outcome.stats.total_pieces, 5);
        assert_eq!(outcome.parts[1].audit.source_ref.as_deref(), Some("row:3"));
    }

    #[test]
    fn remote_fetch_feeds_workbook_path() {
        let source = MockRemoteSource::new(Ok(b"L,W\n600,300".to_vec()));
        let outcome = parse_remote(&source, "https://files.local/cut.csv", &DelimitedDecoder, &TabularOptions::default());
        assert_eq!(outcome.parts.len(), 1);

        let failing = MockRemoteSource::new(Err(RemoteError::Status { status: 404, body: String::new() }));
        let outcome = parse_remote(&failing, "https://files.local/missing.csv", &DelimitedDecoder, &TabularOptions::default());
        assert!(outcome.parts.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }
}
