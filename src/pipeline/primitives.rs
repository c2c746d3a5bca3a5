//! Stateless helpers shared by every extractor: text tidying, line
//! splitting, unit-aware dimension values, label cleanup, edge and material
//! recognition, and the per-field confidence formula.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::patterns::{
    StripKind, DIMENSION_VALUE, EDGE_PATTERNS, LABEL_CLEANUP_PATTERNS, LABEL_TRIM_CHARS,
    MAX_LABEL_LEN,
};
use crate::models::EdgeId;

/// Multiplication sign glued to a unit or digit on both sides: "720mmx560mm".
static GLUED_TIMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)(\d|mm|cm|in|")\s*([x×\*])\s*(\d)"#).unwrap());

/// Sides of a part outside this band are considered unreasonable (mm).
pub const REASONABLE_DIMENSION_RANGE_MM: (f64, f64) = (10.0, 3000.0);

/// Remove control characters, collapse whitespace and space out glued
/// multiplication signs. Case is preserved so labels keep their spelling.
pub fn tidy(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    // Two passes: "1x2x3" overlaps on the middle digit.
    let once = GLUED_TIMES.replace_all(&collapsed, "$1 $2 $3").into_owned();
    GLUED_TIMES.replace_all(&once, "$1 $2 $3").into_owned()
}

/// Lowercased, trimmed, whitespace-collapsed form used for matching.
/// Unicode multiplication signs survive.
pub fn normalize(text: &str) -> String {
    tidy(text).to_lowercase()
}

/// Split pasted text into (1-based line number, tidied line), dropping blank
/// lines and `#` / `//` comment lines.
pub fn split_lines(text: &str) -> Vec<(usize, String)> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = tidy(raw);
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                None
            } else {
                Some((idx + 1, line))
            }
        })
        .collect()
}

/// Millimetre factor for a unit suffix. Bare numbers are millimetres.
pub fn unit_factor(unit: Option<&str>) -> f64 {
    match unit.map(|u| u.trim().to_lowercase()) {
        None => 1.0,
        Some(u) if u.is_empty() => 1.0,
        Some(u) if u.starts_with("cm") || u.starts_with("centimet") => 10.0,
        Some(u) if u.starts_with("in") || u == "\"" || u == "''" => 25.4,
        _ => 1.0,
    }
}

/// Parse a number that may carry a unit suffix (mm, cm, in) and return
/// millimetres. Accepts a decimal comma ("72,5cm").
pub fn parse_dimension_value(token: &str) -> Option<f64> {
    let caps = DIMENSION_VALUE.captures(token)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let mm = value * unit_factor(caps.get(2).map(|m| m.as_str()));
    mm.is_finite().then_some(round_mm(mm))
}

/// Value/unit capture pair from a dimension recognizer, converted to mm.
pub fn capture_mm(caps: &Captures<'_>, value_group: usize, unit_group: usize) -> Option<f64> {
    let value: f64 = caps.get(value_group)?.as_str().parse().ok()?;
    let mm = value * unit_factor(caps.get(unit_group).map(|m| m.as_str()));
    mm.is_finite().then_some(round_mm(mm))
}

/// Round to 0.1 mm so inch conversions stay readable.
fn round_mm(mm: f64) -> f64 {
    (mm * 10.0).round() / 10.0
}

/// First capture across an ordered pattern list (first-match-wins).
pub fn first_capture<'t>(patterns: &[Regex], text: &'t str) -> Option<Captures<'t>> {
    patterns.iter().find_map(|p| p.captures(text))
}

pub fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

// ──────────────────────────────────────────────
// Labels
// ──────────────────────────────────────────────

/// Derive a descriptive label by removing every recognized token type in
/// pattern order, then the material keyword, then trimming punctuation.
///
/// Soft removals (operation words, the material keyword) are skipped when
/// they would leave fewer than two letters, so a line whose only words are
/// "Groove" or "MDF" keeps them as its label.
pub fn clean_label(text: &str, material_keyword: Option<&str>) -> Option<String> {
    let mut label = tidy(text);

    for (pattern, kind) in LABEL_CLEANUP_PATTERNS.iter() {
        let stripped = pattern.replace_all(&label, " ").into_owned();
        if *kind == StripKind::Soft && letter_count(&stripped) < 2 {
            continue;
        }
        label = stripped;
    }

    if let Some(keyword) = material_keyword {
        let stripped = remove_word(&label, keyword);
        if letter_count(&stripped) >= 2 {
            label = stripped;
        }
    }

    let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(LABEL_TRIM_CHARS);
    if letter_count(trimmed) == 0 {
        return None;
    }
    Some(truncate_label(trimmed, MAX_LABEL_LEN))
}

/// Cap a label at `max` characters, ending in "..." when cut.
pub fn truncate_label(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        return label.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = label.chars().take(keep).collect();
    out = out.trim_end().to_string();
    out.push_str("...");
    out
}

fn letter_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

/// Remove whole-word occurrences of `word`, case-insensitively.
fn remove_word(text: &str, word: &str) -> String {
    match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word))) {
        Ok(pattern) => pattern.replace_all(text, " ").into_owned(),
        Err(_) => text.to_string(),
    }
}

// ──────────────────────────────────────────────
// Edges
// ──────────────────────────────────────────────

/// Detect edge-banding intent. Returns a de-duplicated list in canonical
/// order (L1, L2, W1, W2); empty when nothing is recognized.
pub fn parse_edges(text: &str) -> Vec<EdgeId> {
    let mut found: Vec<EdgeId> = Vec::new();
    for (pattern, edges) in EDGE_PATTERNS.iter() {
        if pattern.is_match(text) {
            found.extend_from_slice(edges);
        }
    }
    EdgeId::ALL
        .iter()
        .copied()
        .filter(|e| found.contains(e))
        .collect()
}

// ──────────────────────────────────────────────
// Materials
// ──────────────────────────────────────────────

/// A keyword hit against the material table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialMatch<'a> {
    pub keyword: &'a str,
    pub material_id: &'a str,
}

/// Longest keyword from `table` present in `text` as a whole word.
/// Returns `None` when nothing matches; never guesses.
pub fn find_material_match<'a>(text: &str, table: &'a [(&'a str, &'a str)]) -> Option<MaterialMatch<'a>> {
    let haystack = normalize(text);
    table
        .iter()
        .filter(|(keyword, _)| word_positions(&haystack, keyword).next().is_some())
        .max_by_key(|(keyword, _)| keyword.len())
        .map(|&(keyword, material_id)| MaterialMatch {
            keyword,
            material_id,
        })
}

/// Byte offsets where `word` occurs in `haystack` bounded by non-alphanumerics.
fn word_positions<'h>(haystack: &'h str, word: &'h str) -> impl Iterator<Item = usize> + 'h {
    haystack.match_indices(word).filter_map(move |(start, _)| {
        let end = start + word.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        (before_ok && after_ok).then_some(start)
    })
}

// ──────────────────────────────────────────────
// Confidence
// ──────────────────────────────────────────────

/// Which fields an extractor found for one candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceFlags {
    pub has_dimensions: bool,
    pub has_quantity: bool,
    pub has_label: bool,
    pub has_material: bool,
    pub has_thickness: bool,
    pub dimensions_reasonable: bool,
}

/// Floor contribution for a candidate whose dimensions were found.
pub const CONFIDENCE_DIMENSIONS: f32 = 0.5;

/// Increment for each optional field that was found.
pub const CONFIDENCE_FIELD_STEP: f32 = 0.1;

/// Additive confidence: 0.5 for dimensions, plus 0.1 for each of quantity,
/// label, material, thickness and reasonable dimensions. Bounded to [0, 1].
pub fn calculate_confidence(flags: &ConfidenceFlags) -> f32 {
    if !flags.has_dimensions {
        return 0.0;
    }
    let extras = [
        flags.has_quantity,
        flags.has_label,
        flags.has_material,
        flags.has_thickness,
        flags.dimensions_reasonable,
    ]
    .iter()
    .filter(|f| **f)
    .count() as f32;

    (CONFIDENCE_DIMENSIONS + extras * CONFIDENCE_FIELD_STEP).clamp(0.0, 1.0)
}

/// Banded sanity check: both sides within [10, 3000] mm.
pub fn are_dimensions_reasonable(l: f64, w: f64) -> bool {
    let (min, max) = REASONABLE_DIMENSION_RANGE_MM;
    (min..=max).contains(&l) && (min..=max).contains(&w)
}
