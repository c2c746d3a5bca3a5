//! Binary spreadsheet decoding (xlsx, xls, ods) and upload-type dispatch.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::delimited::{DelimitedDecoder, TableData, WorkbookDecoder};
use super::TabularError;

/// Zip container: xlsx and ods.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// OLE compound file: legacy xls.
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Spreadsheet,
    Delimited,
}

/// Classify an upload by its leading bytes. Anything that is not a known
/// spreadsheet container is treated as delimited text.
pub fn detect_upload_kind(bytes: &[u8]) -> UploadKind {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        UploadKind::Spreadsheet
    } else {
        UploadKind::Delimited
    }
}

/// Reads the first worksheet of an xlsx, xls or ods file. The first row
/// with any content is the header row.
pub struct SpreadsheetDecoder;

impl WorkbookDecoder for SpreadsheetDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<TableData, TabularError> {
        let mut sheets = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| TabularError::Decode(e.to_string()))?;
        let range = sheets
            .worksheet_range_at(0)
            .ok_or(TabularError::Empty)?
            .map_err(|e| TabularError::Decode(e.to_string()))?;

        let mut records = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
        let headers = records
            .find(|r| r.iter().any(|c| !c.is_empty()))
            .ok_or(TabularError::Empty)?;
        let rows: Vec<Vec<String>> = records.collect();

        tracing::debug!(columns = headers.len(), rows = rows.len(), "Worksheet decoded");
        Ok(TableData { headers, rows })
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Picks the decoder from the upload's content, so one entry point serves
/// spreadsheet files and CSV/TSV alike.
pub struct AutoDecoder;

impl WorkbookDecoder for AutoDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<TableData, TabularError> {
        let kind = detect_upload_kind(bytes);
        tracing::debug!(?kind, len = bytes.len(), "Decoding upload");
        match kind {
            UploadKind::Spreadsheet => SpreadsheetDecoder.decode(bytes),
            UploadKind::Delimited => DelimitedDecoder.decode(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tabular::{parse_workbook, TabularOptions};
    use rust_xlsxwriter::Workbook;

    enum Cell<'a> {
        Text(&'a str),
        Number(f64),
    }

    fn xlsx(rows: &[&[Cell]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) => sheet.write_string(r as u32, c as u16, *s).unwrap(),
                    Cell::Number(n) => sheet.write_number(r as u32, c as u16, *n).unwrap(),
                };
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn upload_kind_from_magic_bytes() {
        assert_eq!(detect_upload_kind(b"PK\x03\x04rest"), UploadKind::Spreadsheet);
        assert_eq!(detect_upload_kind(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]), UploadKind::Spreadsheet);
        assert_eq!(detect_upload_kind(b"L,W\n600,300"), UploadKind::Delimited);
        assert_eq!(detect_upload_kind(b""), UploadKind::Delimited);
    }

    #[test]
    fn first_sheet_is_decoded_as_text_cells() {
        use Cell::*;
        let bytes = xlsx(&[
            &[Text("Name"), Text("Length"), Text("Width"), Text("Qty")],
            &[Text("Side"), Number(720.0), Number(560.0), Number(2.0)],
            &[Text("Shelf"), Number(600.5), Number(300.0)],
        ]);
        let table = SpreadsheetDecoder.decode(&bytes).unwrap();
        assert_eq!(table.headers, ["Name", "Length", "Width", "Qty"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], ["Side", "720", "560", "2"]);
        assert_eq!(table.rows[1][1], "600.5");
    }

    #[test]
    fn workbook_bytes_become_parts() {
        use Cell::*;
        let bytes = xlsx(&[
            &[Text("Name"), Text("L (mm)"), Text("W (mm)"), Text("Qty")],
            &[Text("Door"), Number(720.0), Number(400.0), Number(2.0)],
            &[Text("Shelf"), Number(600.0), Number(300.0), Number(3.0)],
        ]);
        let outcome = parse_workbook(&bytes, &AutoDecoder, &TabularOptions::default());
        assert_eq!(outcome.parts.len(), 2, "Expected 2 parts, got {:?}", outcome.errors);
        assert_eq!(outcome.stats.total_pieces, 5);
        assert_eq!(outcome.parts[0].label.as_deref(), Some("Door"));
        assert_eq!((outcome.parts[1].size.l, outcome.parts[1].size.w), (600.0, 300.0));
    }

    #[test]
    fn delimited_uploads_still_work() {
        let outcome = parse_workbook(b"L;W;Qty\n600;300;2", &AutoDecoder, &TabularOptions::default());
        assert_eq!(outcome.parts.len(), 1);
        assert_eq!(outcome.parts[0].qty, 2);
    }

    #[test]
    fn corrupt_container_is_a_decode_error() {
        let err = SpreadsheetDecoder.decode(b"PK\x03\x04not really a zip").unwrap_err();
        assert!(matches!(err, TabularError::Decode(_)), "Expected Decode, got {err:?}");

        let outcome = parse_workbook(b"PK\x03\x04not really a zip", &AutoDecoder, &TabularOptions::default());
        assert!(outcome.parts.is_empty());
        assert!(
            outcome.errors[0].message.starts_with("Workbook decode failed"),
            "got {}",
            outcome.errors[0].message
        );
    }

    #[test]
    fn empty_sheet_has_no_header() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();
        let err = SpreadsheetDecoder.decode(&bytes).unwrap_err();
        assert!(matches!(err, TabularError::Empty), "Expected Empty, got {err:?}");
    }
}
