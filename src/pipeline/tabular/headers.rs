//! Column-role detection from spreadsheet headers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::primitives::{normalize, unit_factor};

/// Semantic role of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnField {
    Label,
    Length,
    Width,
    Quantity,
    Thickness,
    Material,
    Grain,
    Rotation,
    Edging,
    Group,
}

impl ColumnField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Length => "length",
            Self::Width => "width",
            Self::Quantity => "quantity",
            Self::Thickness => "thickness",
            Self::Material => "material",
            Self::Grain => "grain",
            Self::Rotation => "rotation",
            Self::Edging => "edging",
            Self::Group => "group",
        }
    }
}

/// Fields a mapping must resolve before any row is processed.
pub const REQUIRED_FIELDS: [ColumnField; 2] = [ColumnField::Length, ColumnField::Width];

/// Per-field header recognizers, in claim order. Dimensions claim first so a
/// generic label pattern cannot take "Length".
static HEADER_PATTERNS: LazyLock<Vec<(ColumnField, Vec<Regex>)>> = LazyLock::new(|| {
    let re = |p: &str| Regex::new(p).unwrap();
    vec![
        (
            ColumnField::Length,
            vec![re(r"^(?:l|len|length|long|height|h)$"), re(r"\blength\b")],
        ),
        (
            ColumnField::Width,
            vec![re(r"^(?:w|wid|width|wide|depth|d)$"), re(r"\bwidth\b")],
        ),
        (
            ColumnField::Quantity,
            vec![
                re(r"^(?:qty|qnty|quantity|count|pcs|pieces|no\.?|#|amount|number)$"),
                re(r"\b(?:qty|quantity)\b"),
            ],
        ),
        (
            ColumnField::Thickness,
            vec![re(r"^(?:t|thk|thick|thickness)$"), re(r"\bthick(?:ness)?\b")],
        ),
        (
            ColumnField::Material,
            vec![re(r"^(?:mat|material|board|substrate|sheet)$"), re(r"\bmaterial\b")],
        ),
        (
            ColumnField::Grain,
            vec![re(r"^grain(?:\s*direction)?$"), re(r"\bgrain\b")],
        ),
        (
            ColumnField::Rotation,
            vec![
                re(r"^(?:rot|rotate|rotation|can\s*rotate|allow\s*rotation)$"),
                re(r"\brotat"),
            ],
        ),
        (
            ColumnField::Edging,
            vec![
                re(r"^(?:edge|edges|edging|edge\s*band(?:ing)?|eb|banding)$"),
                re(r"\bedg"),
            ],
        ),
        (
            ColumnField::Group,
            vec![re(r"^(?:group|group\s*id|cabinet|assembly)$")],
        ),
        (
            ColumnField::Label,
            vec![
                re(r"^(?:name|label|part|part\s*name|description|desc|item|ref|reference)$"),
                re(r"\b(?:name|label|description)\b"),
            ],
        ),
    ]
});

/// Unit suffix on a header: "L (mm)", "Width [in]", "length_cm".
static UNIT_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:[\(\[]\s*(mm|cm|in|inch|inches)\s*[\)\]]|_(mm|cm|in))\s*$").unwrap()
});

/// Column index per field, plus a millimetre factor for dimension columns
/// whose header carried a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub columns: BTreeMap<ColumnField, usize>,
    pub unit_factors: BTreeMap<ColumnField, f64>,
}

impl ColumnMapping {
    pub fn get(&self, field: ColumnField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn set(&mut self, field: ColumnField, column: usize) {
        self.columns.insert(field, column);
    }

    /// Millimetre factor for a column (1.0 unless its header named a unit).
    pub fn factor(&self, field: ColumnField) -> f64 {
        self.unit_factors.get(&field).copied().unwrap_or(1.0)
    }

    pub fn missing_required(&self) -> Vec<ColumnField> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    /// Both length and width resolved.
    pub fn is_valid(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// Detect column roles from header names.
///
/// For each field in claim order, the first unclaimed header matching any
/// of its patterns wins; a header is never claimed twice. A second pass
/// strips unit suffixes so "L (mm)" can still resolve length or width.
pub fn detect_columns(headers: &[String]) -> ColumnMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
    let mut claimed = vec![false; headers.len()];
    let mut mapping = ColumnMapping::default();

    for (field, patterns) in HEADER_PATTERNS.iter() {
        let hit = (0..normalized.len())
            .find(|&i| !claimed[i] && patterns.iter().any(|p| p.is_match(&normalized[i])));
        if let Some(idx) = hit {
            mapping.set(*field, idx);
            claimed[idx] = true;
        }
    }

    for (field, patterns) in HEADER_PATTERNS
        .iter()
        .filter(|(f, _)| REQUIRED_FIELDS.contains(f))
    {
        if mapping.get(*field).is_some() {
            continue;
        }
        let hit = (0..normalized.len()).find(|&i| {
            if claimed[i] || !UNIT_SUFFIX.is_match(&normalized[i]) {
                return false;
            }
            let base = UNIT_SUFFIX.replace(&normalized[i], "");
            patterns.iter().any(|p| p.is_match(base.trim()))
        });
        if let Some(idx) = hit {
            mapping.set(*field, idx);
            claimed[idx] = true;
        }
    }

    for field in REQUIRED_FIELDS {
        let Some(idx) = mapping.get(field) else {
            continue;
        };
        if let Some(caps) = UNIT_SUFFIX.captures(&normalized[idx]) {
            let unit = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
            mapping.unit_factors.insert(field, unit_factor(unit));
        }
    }

    tracing::debug!(
        headers = headers.len(),
        mapped = mapping.columns.len(),
        valid = mapping.is_valid(),
        "Column detection complete"
    );
    mapping
}
