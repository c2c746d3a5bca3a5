//! Ingestion entry point.
//!
//! Routes any supported input to its extractor, validates every produced
//! part under the configured policy, and returns one report. The network
//! edges (extraction service, remote files) are injected as trait objects so
//! the processor stays testable with the mocks in `remote`.

use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;
use crate::models::Part;
use crate::pipeline::remote::{
    ExtractionClient, HttpExtractionClient, HttpRemoteSource, RemoteError, RemoteSource,
};
use crate::pipeline::tabular::{
    parse_delimited_text, parse_remote, parse_table, parse_workbook, AutoDecoder, TableData,
    WorkbookDecoder,
};
use crate::pipeline::text::parse_text;
use crate::pipeline::types::{ParseIssue, ParseOutcome, ParseStats};
use crate::pipeline::validation::{validate_batch, ValidationPolicy, ValidationReport};
use crate::pipeline::vision::{extract_from_image, parse_ocr_text, parse_vision_response};
use crate::pipeline::voice::{parse_transcript, TranscriptFragment};

// ---------------------------------------------------------------------------
// Input and report types
// ---------------------------------------------------------------------------

/// One unit of input, tagged by channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum IngestInput {
    /// Pasted multi-line text.
    Text(String),
    /// Speech-to-text fragments in arrival order.
    Transcript(Vec<TranscriptFragment>),
    /// CSV/TSV text.
    Delimited(String),
    /// An already-decoded table.
    Table(TableData),
    /// Raw response text from the extraction service.
    VisionResponse(String),
    /// OCR text of a scanned sheet.
    OcrText(String),
}

impl IngestInput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Transcript(_) => "transcript",
            Self::Delimited(_) => "delimited",
            Self::Table(_) => "table",
            Self::VisionResponse(_) => "vision_response",
            Self::OcrText(_) => "ocr_text",
        }
    }
}

/// Validated parts plus the extractor's diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Normalized parts, in input order.
    pub parts: Vec<Part>,
    /// One report per part, same order as `parts`.
    pub reports: Vec<ValidationReport>,
    pub errors: Vec<ParseIssue>,
    pub warnings: Vec<String>,
    pub stats: ParseStats,
    pub valid_count: usize,
    pub needs_review_count: usize,
}

impl IngestReport {
    /// Reports needing a human look, least trustworthy first.
    pub fn review_queue(&self, threshold: f32) -> Vec<&ValidationReport> {
        crate::pipeline::validation::review_queue(&self.reports, threshold)
    }
}

// ---------------------------------------------------------------------------
// Stateless entry point
// ---------------------------------------------------------------------------

/// Extract and validate one input. Never fails; problems land in
/// `errors`/`warnings`.
pub fn ingest(input: &IngestInput, config: &IngestConfig) -> IngestReport {
    let _span = tracing::info_span!("ingest", kind = input.kind()).entered();

    let outcome = match input {
        IngestInput::Text(text) => parse_text(text, &config.text),
        IngestInput::Transcript(fragments) => parse_transcript(fragments, &config.voice),
        IngestInput::Delimited(text) => parse_delimited_text(text, &config.tabular),
        IngestInput::Table(table) => parse_table(table, &config.tabular),
        IngestInput::VisionResponse(response) => parse_vision_response(response, &config.vision),
        IngestInput::OcrText(text) => parse_ocr_text(text, &config.vision, &config.text),
    };
    finish(outcome, &config.validation)
}

fn finish(outcome: ParseOutcome, policy: &ValidationPolicy) -> IngestReport {
    let batch = validate_batch(&outcome.parts, policy);
    let parts: Vec<Part> = batch
        .reports
        .iter()
        .map(|r| r.normalized_part.clone())
        .collect();

    // Validation may default a quantity, so pieces are recounted.
    let stats = ParseStats {
        total_pieces: parts.iter().map(|p| u64::from(p.qty)).sum(),
        ..outcome.stats
    };

    tracing::info!(
        total = stats.total_lines,
        parsed = stats.parsed_lines,
        failed = stats.failed_lines,
        pieces = stats.total_pieces,
        needs_review = batch.needs_review_count,
        "Ingestion complete"
    );

    IngestReport {
        parts,
        reports: batch.reports,
        errors: outcome.errors,
        warnings: outcome.warnings,
        stats,
        valid_count: batch.valid_count,
        needs_review_count: batch.needs_review_count,
    }
}

// ---------------------------------------------------------------------------
// Processor with network edges
// ---------------------------------------------------------------------------

/// Ingestion with the extraction service, remote file source and workbook
/// decoder wired in.
pub struct Ingestor {
    config: IngestConfig,
    extraction: Box<dyn ExtractionClient + Send + Sync>,
    remote: Box<dyn RemoteSource + Send + Sync>,
    decoder: Box<dyn WorkbookDecoder + Send + Sync>,
}

impl Ingestor {
    pub fn new(
        config: IngestConfig,
        extraction: Box<dyn ExtractionClient + Send + Sync>,
        remote: Box<dyn RemoteSource + Send + Sync>,
        decoder: Box<dyn WorkbookDecoder + Send + Sync>,
    ) -> Self {
        Self {
            config,
            extraction,
            remote,
            decoder,
        }
    }

    /// HTTP clients from `config.service`. Uploads are decoded as xlsx, xls
    /// or ods by content, falling back to delimited text.
    pub fn from_config(config: IngestConfig) -> Result<Self, RemoteError> {
        let extraction = HttpExtractionClient::new(&config.service)?;
        let remote = HttpRemoteSource::new(&config.service)?;
        tracing::info!(endpoint = %extraction.endpoint(), "Ingestor ready");
        Ok(Self::new(
            config,
            Box::new(extraction),
            Box::new(remote),
            Box::new(AutoDecoder),
        ))
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn ingest(&self, input: &IngestInput) -> IngestReport {
        ingest(input, &self.config)
    }

    /// Send a document image to the extraction service.
    pub fn ingest_image(&self, image: &[u8], mime_type: &str) -> IngestReport {
        let _span = tracing::info_span!("ingest", kind = "image").entered();
        let outcome = extract_from_image(self.extraction.as_ref(), image, mime_type, &self.config.vision);
        finish(outcome, &self.config.validation)
    }

    /// Decode spreadsheet bytes.
    pub fn ingest_workbook(&self, bytes: &[u8]) -> IngestReport {
        let _span = tracing::info_span!("ingest", kind = "workbook").entered();
        let outcome = parse_workbook(bytes, self.decoder.as_ref(), &self.config.tabular);
        finish(outcome, &self.config.validation)
    }

    /// Fetch a spreadsheet by URL, then decode it.
    pub fn ingest_remote_table(&self, url: &str) -> IngestReport {
        let _span = tracing::info_span!("ingest", kind = "remote_table").entered();
        let outcome = parse_remote(
            self.remote.as_ref(),
            url,
            self.decoder.as_ref(),
            &self.config.tabular,
        );
        finish(outcome, &self.config.validation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMethod;
    use crate::pipeline::remote::{MockExtractionClient, MockRemoteSource};
    use rand::{Rng, SeedableRng};

    fn mock_ingestor(response: &str, file: Result<Vec<u8>, RemoteError>) -> Ingestor {
        Ingestor::new(
            IngestConfig::default(),
            Box::new(MockExtractionClient::new(response)),
            Box::new(MockRemoteSource::new(file)),
            Box::new(AutoDecoder),
        )
    }

    fn assert_stats_consistent(report: &IngestReport) {
        let pieces: u64 = report.parts.iter().map(|p| u64::from(p.qty)).sum();
        assert_eq!(report.stats.total_pieces, pieces);
        assert_eq!(
            report.stats.parsed_lines + report.stats.failed_lines,
            report.stats.total_lines
        );
        assert_eq!(report.parts.len(), report.reports.len());
    }

    #[test]
    fn text_input_is_parsed_and_validated() {
        let report = ingest(
            &IngestInput::Text("Side 720x560 qty 2 white melamine\nrubbish\n".into()),
            &IngestConfig::default(),
        );
        assert_eq!(report.parts.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.stats.total_pieces, 2);
        assert_eq!(report.parts[0].material_id, "MEL-WHT");
        assert_eq!(report.valid_count, 1);
        assert_stats_consistent(&report);
    }

    #[test]
    fn every_channel_stamps_its_source() {
        let config = IngestConfig::default();
        let cases = [
            (IngestInput::Text("600x300".into()), SourceMethod::PastedText),
            (
                IngestInput::Transcript(vec![TranscriptFragment::new("six hundred by three hundred", true)]),
                SourceMethod::Voice,
            ),
            (IngestInput::Delimited("L,W\n600,300".into()), SourceMethod::Tabular),
            (IngestInput::VisionResponse(r#"[{"L":600,"W":300}]"#.into()), SourceMethod::GenericOcr),
            (IngestInput::OcrText("600x300".into()), SourceMethod::GenericOcr),
        ];
        for (input, method) in cases {
            let report = ingest(&input, &config);
            assert_eq!(report.parts.len(), 1, "no part for {}", input.kind());
            assert_eq!(report.parts[0].audit.source_method, method);
            assert_stats_consistent(&report);
        }
    }

    #[test]
    fn invalid_table_mapping_processes_no_rows() {
        let report = ingest(
            &IngestInput::Delimited("Name,L (mm),Qty\nShelf,600,2\n".into()),
            &IngestConfig::default(),
        );
        assert!(report.parts.is_empty());
        assert_eq!(report.stats.total_lines, 0);
        assert!(report.errors[0].message.contains("width"));
    }

    #[test]
    fn validation_caps_confidence() {
        let report = ingest(&IngestInput::Text("5000x560".into()), &IngestConfig::default());
        assert!(report.reports[0].warnings.iter().any(|w| w.contains("exceeds typical max")));
        assert_eq!(report.needs_review_count, 1);
        assert_eq!(report.review_queue(0.85).len(), 1);
    }

    #[test]
    fn ingestor_routes_network_inputs() {
        let ingestor = mock_ingestor(
            "```json\n[{\"L\": 720, \"W\": 400, \"qty\": 3}]\n```",
            Ok(b"Length,Width\n800,400\n".to_vec()),
        );
        let image = ingestor.ingest_image(b"png-bytes", "image/png");
        assert_eq!(image.stats.total_pieces, 3);

        let remote = ingestor.ingest_remote_table("https://files.local/cuts.csv");
        assert_eq!(remote.parts.len(), 1);
        assert_eq!(remote.parts[0].size.l, 800.0);

        let workbook = ingestor.ingest_workbook(b"L;W\n500;250\n");
        assert_eq!(workbook.parts.len(), 1);
    }

    #[test]
    fn spreadsheet_upload_is_decoded() {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        sheet.write_string(0, 0, "Length").unwrap();
        sheet.write_string(0, 1, "Width").unwrap();
        sheet.write_number(1, 0, 720.0).unwrap();
        sheet.write_number(1, 1, 560.0).unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let ingestor = mock_ingestor("[]", Ok(bytes.clone()));
        let report = ingestor.ingest_workbook(&bytes);
        assert_eq!(report.parts.len(), 1, "Expected 1 part, got {:?}", report.errors);
        assert_eq!(report.parts[0].audit.source_method, SourceMethod::Tabular);

        let remote = ingestor.ingest_remote_table("https://files.local/cuts.xlsx");
        assert_eq!(remote.parts[0].size.w, 560.0);
    }

    #[test]
    fn remote_failure_is_reported_not_raised() {
        let ingestor = mock_ingestor(
            "[]",
            Err(RemoteError::Status {
                status: 404,
                body: "missing".into(),
            }),
        );
        let report = ingestor.ingest_remote_table("https://files.local/missing.csv");
        assert!(report.parts.is_empty());
        assert!(report.errors[0].message.contains("404"));
    }

    #[test]
    fn input_kind_serializes_tagged() {
        let json = serde_json::to_value(IngestInput::Text("600x300".into())).unwrap();
        assert_eq!(json["kind"], "text");
        assert_eq!(json["data"], "600x300");
    }

    const FUZZ_WORDS: &[&str] = &[
        "x", "by", "qty", "pcs", "mm", "cm", "inch", "thick", "edge", "all", "long", "short", "grain", "GL",
        "no", "rotate", "twenty", "five", "hundred", "sixty", "and", "of", "L:", "W:", "melamine", "groove",
        "{", "}", "[", "]", "\"L\":", ",", ";", "\n", "```json", "×", "é", "0", "-3", "99999", "1e308",
    ];

    fn random_input(rng: &mut rand::rngs::StdRng) -> String {
        let len = rng.gen_range(0..24);
        let mut out = String::new();
        for _ in 0..len {
            if rng.gen_bool(0.4) {
                out.push_str(&rng.gen_range(0..4000u32).to_string());
            } else if rng.gen_bool(0.8) {
                out.push_str(FUZZ_WORDS[rng.gen_range(0..FUZZ_WORDS.len())]);
            } else {
                out.push(rng.gen::<char>());
            }
            out.push(if rng.gen_bool(0.8) { ' ' } else { 'x' });
        }
        out
    }

    #[test]
    fn confidence_stays_in_unit_interval_for_any_input() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        let config = IngestConfig::default();
        for _ in 0..400 {
            let text = random_input(&mut rng);
            let bytes: Vec<u8> = (0..rng.gen_range(0..64)).map(|_| rng.gen()).collect();
            let inputs = [
                IngestInput::Text(text.clone()),
                IngestInput::Transcript(vec![
                    TranscriptFragment::new(text.clone(), false),
                    TranscriptFragment::new(random_input(&mut rng), true),
                ]),
                IngestInput::Delimited(format!("L,W,Qty\n{}", text.replace(' ', ","))),
                IngestInput::Delimited(String::from_utf8_lossy(&bytes).into_owned()),
                IngestInput::VisionResponse(text.clone()),
                IngestInput::VisionResponse(format!(
                    "[{{\"L\": {}, \"W\": \"{}\", \"qty\": {}}}]",
                    rng.gen_range(-10.0..5000.0f64),
                    text.replace('"', ""),
                    rng.gen_range(-5..100000i64)
                )),
                IngestInput::OcrText(text.clone()),
            ];
            for input in &inputs {
                let report = ingest(input, &config);
                for part in &report.parts {
                    let c = part.audit.confidence;
                    assert!((0.0..=1.0).contains(&c), "Expected confidence in [0,1], got {c} for {input:?}");
                }
                assert_stats_consistent(&report);
            }
        }
    }
}
