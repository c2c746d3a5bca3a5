use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::models::{Grain, Part, SourceMethod, DEFAULT_THICKNESS_MM};
use crate::pipeline::patterns::{
    GRAIN_LENGTH_PATTERNS, GRAIN_WIDTH_PATTERNS, LABELLED_DIMENSIONS, MATERIAL_KEYWORDS,
    NO_ROTATE_PATTERNS, PAIR_DIMENSIONS, QUANTITY_PATTERNS, QUANTITY_RANGE,
    THICKNESS_DETECT_RANGE_MM, THICKNESS_PATTERNS, TRIPLE_DIMENSIONS,
};
use crate::pipeline::primitives::{
    any_match, are_dimensions_reasonable, calculate_confidence, capture_mm, clean_label,
    find_material_match, parse_edges, split_lines, tidy, ConfidenceFlags,
};
use crate::pipeline::types::ParseOutcome;

/// Options for free-text parsing. One record per call, no parser state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextParseOptions {
    pub default_thickness_mm: f64,
    /// Applied when no material keyword is recognized.
    pub default_material_id: Option<String>,
    /// Rotation permission when the line says nothing about grain.
    pub allow_rotation_default: bool,
    /// Parts scoring below this are demoted (strict) or flagged (lenient).
    pub min_confidence: f32,
    pub strict: bool,
    /// Provenance stamped on produced parts (pasted text, OCR text, ...).
    pub source_method: SourceMethod,
}

impl Default for TextParseOptions {
    fn default() -> Self {
        Self {
            default_thickness_mm: DEFAULT_THICKNESS_MM,
            default_material_id: None,
            allow_rotation_default: true,
            min_confidence: 0.5,
            strict: false,
            source_method: SourceMethod::PastedText,
        }
    }
}

/// Dimensions found on a line, with whatever the triple form implied.
#[derive(Debug, Clone, PartialEq)]
struct DimensionHit {
    l: f64,
    w: f64,
    thickness: Option<f64>,
    qty: Option<u32>,
    span: Range<usize>,
}

/// Parse multi-line text. Every non-blank, non-comment line is counted;
/// lines without dimensions become errors and the batch continues.
pub fn parse_text(text: &str, options: &TextParseOptions) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for (line_no, line) in split_lines(text) {
        match parse_line_checked(&line, options) {
            Ok(mut part) => {
                part.audit.source_ref = Some(format!("line:{line_no}"));
                let confidence = part.audit.confidence;
                if confidence < options.min_confidence {
                    let message = format!(
                        "Confidence {confidence:.2} below minimum {:.2}",
                        options.min_confidence
                    );
                    if options.strict {
                        tracing::debug!(line = line_no, confidence, "Line rejected in strict mode");
                        outcome.push_failure(line_no, &line, message);
                        continue;
                    }
                    outcome.warnings.push(format!("Line {line_no}: {message}"));
                    part.parse_warnings.push(message);
                }
                outcome.push_part(part);
            }
            Err(message) => {
                tracing::debug!(line = line_no, reason = %message, "Line not parsed");
                outcome.push_failure(line_no, &line, message);
            }
        }
    }

    tracing::info!(
        total = outcome.stats.total_lines,
        parsed = outcome.stats.parsed_lines,
        failed = outcome.stats.failed_lines,
        pieces = outcome.stats.total_pieces,
        "Text parse complete"
    );
    outcome
}

/// Parse one line into a part candidate. `None` when no dimensions are found.
pub fn parse_line(line: &str, options: &TextParseOptions) -> Option<Part> {
    parse_line_checked(line, options).ok()
}

/// Parse one line, returning the reason on failure.
fn parse_line_checked(line: &str, options: &TextParseOptions) -> Result<Part, String> {
    let tidied = tidy(line);
    if tidied.is_empty() {
        return Err("Empty line".into());
    }
    let lower = tidied.to_lowercase();

    let dims = detect_dimensions(&lower).ok_or_else(|| "No dimensions found".to_string())?;
    if !(dims.l > 0.0 && dims.w > 0.0) {
        return Err("Dimensions must be greater than zero".into());
    }

    let mut remainder = cut_span(&lower, &dims.span);

    let thickness = match dims.thickness {
        Some(t) => Some(t),
        None => detect_thickness(&remainder).map(|(t, span)| {
            remainder = cut_span(&remainder, &span);
            t
        }),
    };
    let qty = dims.qty.or_else(|| detect_quantity(&remainder));

    let grain = detect_grain(&remainder);
    let no_rotate = any_match(&NO_ROTATE_PATTERNS, &remainder);
    let edges = parse_edges(&remainder);
    let material = find_material_match(&remainder, MATERIAL_KEYWORDS);
    let label = clean_label(&tidied, material.map(|m| m.keyword));

    let mut part = Part::new(dims.l, dims.w, options.source_method);
    part.qty = qty.unwrap_or(1);
    part.thickness_mm = thickness.unwrap_or(options.default_thickness_mm);
    part.material_id = match material {
        Some(m) => m.material_id.to_string(),
        None => options.default_material_id.clone().unwrap_or_default(),
    };
    part.label = label;
    part.set_orientation(grain, no_rotate, options.allow_rotation_default);
    part.set_edges(&edges);
    part.raw_text = Some(line.to_string());

    let flags = ConfidenceFlags {
        has_dimensions: true,
        has_quantity: qty.is_some(),
        has_label: part.label.is_some(),
        has_material: material.is_some(),
        has_thickness: thickness.is_some(),
        dimensions_reasonable: are_dimensions_reasonable(dims.l, dims.w),
    };
    part.set_confidence(calculate_confidence(&flags));
    Ok(part)
}

/// Try labelled, triple and pair recognizers in that order.
fn detect_dimensions(text: &str) -> Option<DimensionHit> {
    if let Some(caps) = LABELLED_DIMENSIONS.captures(text) {
        let span = caps.get(0)?.range();
        return Some(DimensionHit {
            l: capture_mm(&caps, 1, 2)?,
            w: capture_mm(&caps, 3, 4)?,
            thickness: None,
            qty: None,
            span,
        });
    }

    if let Some(caps) = TRIPLE_DIMENSIONS.captures(text) {
        let span = caps.get(0)?.range();
        let a = capture_mm(&caps, 1, 2)?;
        let b = capture_mm(&caps, 3, 4)?;
        let c = capture_mm(&caps, 5, 6)?;
        if let Some(hit) = interpret_triple(a, b, c, span) {
            return Some(hit);
        }
    }

    let caps = PAIR_DIMENSIONS.captures(text)?;
    Some(DimensionHit {
        l: capture_mm(&caps, 1, 2)?,
        w: capture_mm(&caps, 3, 4)?,
        thickness: None,
        qty: None,
        span: caps.get(0)?.range(),
    })
}

/// A triple is L×W×T when the third value is a plausible thickness.
/// Otherwise a small whole number at either end is a count:
/// "2 x 720 x 560" or "720 x 560 x 2".
fn interpret_triple(a: f64, b: f64, c: f64, span: Range<usize>) -> Option<DimensionHit> {
    let (t_min, t_max) = THICKNESS_DETECT_RANGE_MM;
    if (t_min..=t_max).contains(&c) && c < a && c < b {
        return Some(DimensionHit {
            l: a,
            w: b,
            thickness: Some(c),
            qty: None,
            span,
        });
    }
    if let Some(count) = as_count(a).filter(|_| a < b && a < c) {
        return Some(DimensionHit {
            l: b,
            w: c,
            thickness: None,
            qty: Some(count),
            span,
        });
    }
    if let Some(count) = as_count(c).filter(|_| c < a && c < b) {
        return Some(DimensionHit {
            l: a,
            w: b,
            thickness: None,
            qty: Some(count),
            span,
        });
    }
    None
}

fn as_count(value: f64) -> Option<u32> {
    let (min, max) = QUANTITY_RANGE;
    (value.fract() == 0.0 && value >= f64::from(min) && value <= f64::from(max))
        .then_some(value as u32)
}

fn detect_thickness(text: &str) -> Option<(f64, Range<usize>)> {
    let (min, max) = THICKNESS_DETECT_RANGE_MM;
    THICKNESS_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        (min..=max)
            .contains(&value)
            .then(|| (value, caps.get(0).map(|m| m.range()).unwrap_or(0..0)))
    })
}

fn detect_quantity(text: &str) -> Option<u32> {
    let (min, max) = QUANTITY_RANGE;
    QUANTITY_PATTERNS.iter().find_map(|pattern| {
        let caps = pattern.captures(text)?;
        let value: u32 = caps.get(1)?.as_str().parse().ok()?;
        (min..=max).contains(&value).then_some(value)
    })
}

fn detect_grain(text: &str) -> Grain {
    if any_match(&GRAIN_LENGTH_PATTERNS, text) {
        Grain::AlongLength
    } else if any_match(&GRAIN_WIDTH_PATTERNS, text) {
        Grain::AlongWidth
    } else {
        Grain::None
    }
}

/// Replace a byte range with a single space.
fn cut_span(text: &str, span: &Range<usize>) -> String {
    format!("{} {}", &text[..span.start], &text[span.end..])
}
