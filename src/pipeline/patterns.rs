//! Recognizer tables for every semantic field of a part line.
//!
//! Each table is ordered most-specific-first. Consumers try patterns in the
//! declared order and take the first match; the order encodes precedence
//! (an explicit `qty:` label beats a bare `x2` multiplier). Edge tables are
//! the one exception: every matching edge pattern contributes.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::EdgeId;

/// Unit alternation shared by the dimension recognizers.
const UNIT: &str = r#"(mm\b|cm\b|inches\b|inch\b|in\b|")?"#;

/// Number with optional decimal part.
const NUM: &str = r"(\d+(?:\.\d+)?)";

// ──────────────────────────────────────────────
// Dimensions
// ──────────────────────────────────────────────

/// Labelled pair: "L720 W560", "length: 720, width: 560".
/// Groups: 1 value, 2 unit, 3 value, 4 unit.
pub static LABELLED_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\bl(?:en(?:gth)?)?\s*[:=]?\s*{NUM}\s*{UNIT}\s*[,;/]?\s*w(?:id(?:th)?)?\s*[:=]?\s*{NUM}\s*{UNIT}"
    ))
    .unwrap()
});

/// Triple: "720x560x18". Groups: 1/2, 3/4, 5/6 as value/unit.
pub static TRIPLE_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){NUM}\s*{UNIT}\s*[x×\*]\s*{NUM}\s*{UNIT}\s*[x×\*]\s*{NUM}\s*{UNIT}"
    ))
    .unwrap()
});

/// Pair: "720x560", "720 × 560", "720mm by 560mm". Groups: 1/2, 3/4.
pub static PAIR_DIMENSIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){NUM}\s*{UNIT}\s*(?:[x×\*]|\bby\b)\s*{NUM}\s*{UNIT}"
    ))
    .unwrap()
});

/// Single value with unit, used by `parse_dimension_value`.
pub static DIMENSION_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*(\d+(?:[.,]\d+)?)\s*(mm|millimet(?:er|re)s?|cm|centimet(?:er|re)s?|inches|inch|in|"|'')?\s*$"#,
    )
    .unwrap()
});

// ──────────────────────────────────────────────
// Quantity (applied after dimensions and thickness are removed)
// ──────────────────────────────────────────────

pub static QUANTITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // qty: 4, quantity=4, count 4
        Regex::new(r"(?i)\b(?:qty|quantity|qnty|count)\s*[:=#]?\s*(\d+)\b").unwrap(),
        // 4 pcs, 4 pieces, 4 off, 4 no.
        Regex::new(r"(?i)\b(\d+)\s*(?:pcs|pc|pieces?|off|nos|no\.?|units?)(?:\s|$|[^a-z])").unwrap(),
        // x4
        Regex::new(r"(?i)(?:^|\s)[x×]\s*(\d+)\b").unwrap(),
        // 4x
        Regex::new(r"(?i)\b(\d+)\s*[x×](?:\s|$)").unwrap(),
        // leading bare number
        Regex::new(r"^\s*(\d+)\b").unwrap(),
        // trailing bare number
        Regex::new(r"\b(\d+)\s*$").unwrap(),
    ]
});

/// Accepted quantity range for text-detected counts.
pub const QUANTITY_RANGE: (u32, u32) = (1, 9999);

// ──────────────────────────────────────────────
// Thickness (applied after dimensions are removed)
// ──────────────────────────────────────────────

pub static THICKNESS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:thk|thick(?:ness)?|t)\s*[:=]?\s*(\d+(?:\.\d+)?)\s*(?:mm)?\b").unwrap(),
        Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*mm\s*(?:thk|thick(?:ness)?)\b").unwrap(),
        Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:thk|thick)\b").unwrap(),
        Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*mm\b").unwrap(),
    ]
});

/// Thickness band for detection. Values outside are not treated as thickness.
pub const THICKNESS_DETECT_RANGE_MM: (f64, f64) = (3.0, 100.0);

// ──────────────────────────────────────────────
// Grain / rotation
// ──────────────────────────────────────────────

pub static GRAIN_LENGTH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bgrain\s*(?:along\s*)?(?:l|len|length|long)\b").unwrap(),
        Regex::new(r"(?i)\bgrain\s*[:=]\s*l\b").unwrap(),
        Regex::new(r"(?i)\balong[_\s]?l(?:ength)?\b").unwrap(),
        Regex::new(r"(?i)\bgl\b").unwrap(),
    ]
});

pub static GRAIN_WIDTH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bgrain\s*(?:along\s*)?(?:w|wid|width|across)\b").unwrap(),
        Regex::new(r"(?i)\bgrain\s*[:=]\s*w\b").unwrap(),
        Regex::new(r"(?i)\balong[_\s]?w(?:idth)?\b").unwrap(),
        Regex::new(r"(?i)\bcross\s*grain\b").unwrap(),
        Regex::new(r"(?i)\bgw\b").unwrap(),
    ]
});

pub static NO_ROTATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bno\s*rot(?:ate|ation)?\b").unwrap(),
        Regex::new(r"(?i)\b(?:don'?t|do\s+not|cannot|can'?t)\s+rotate\b").unwrap(),
        Regex::new(r"(?i)\bfixed\s+grain\b").unwrap(),
        Regex::new(r"(?i)\bnr\b").unwrap(),
    ]
});

// ──────────────────────────────────────────────
// Edge banding
// ──────────────────────────────────────────────

const ALL_EDGES: &[EdgeId] = &[EdgeId::L1, EdgeId::L2, EdgeId::W1, EdgeId::W2];
const THREE_EDGES: &[EdgeId] = &[EdgeId::L1, EdgeId::L2, EdgeId::W1];
const LONG_EDGES: &[EdgeId] = &[EdgeId::L1, EdgeId::L2];
const SHORT_EDGES: &[EdgeId] = &[EdgeId::W1, EdgeId::W2];

/// Edge-banding recognizers with the edges each one implies.
pub static EDGE_PATTERNS: LazyLock<Vec<(Regex, &'static [EdgeId])>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)\b(?:all\s*(?:4\s*|four\s*)?edges?|(?:4|four)\s*(?:edges?|sides?)|eb\s*all|edge\s*all(?:\s*round)?|all\s*round|4e)\b").unwrap(),
            ALL_EDGES,
        ),
        (
            Regex::new(r"(?i)\b(?:(?:3|three)\s*(?:edges?|sides?)|3e)\b").unwrap(),
            THREE_EDGES,
        ),
        (
            Regex::new(r"(?i)\b(?:2\s*l(?:ong)?|(?:two|both)\s+long(?:\s+edges?)?|long\s+edges)\b").unwrap(),
            LONG_EDGES,
        ),
        (
            Regex::new(r"(?i)\b(?:2\s*(?:w|s|short)|(?:two|both)\s+(?:short|ends)(?:\s+edges?)?|short\s+edges)\b").unwrap(),
            SHORT_EDGES,
        ),
        (
            Regex::new(r"(?i)\b(?:1\s*l(?:ong)?|one\s+long(?:\s+edge)?|front\s+edge|long\s+edge)\b").unwrap(),
            &[EdgeId::L1],
        ),
        (
            Regex::new(r"(?i)\b(?:1\s*(?:w|s|short)|one\s+(?:short|end)(?:\s+edge)?|short\s+edge)\b").unwrap(),
            &[EdgeId::W1],
        ),
        (Regex::new(r"(?i)\bl1\b").unwrap(), &[EdgeId::L1]),
        (Regex::new(r"(?i)\bl2\b").unwrap(), &[EdgeId::L2]),
        (Regex::new(r"(?i)\bw1\b").unwrap(), &[EdgeId::W1]),
        (Regex::new(r"(?i)\bw2\b").unwrap(), &[EdgeId::W2]),
    ]
});

// ──────────────────────────────────────────────
// Materials
// ──────────────────────────────────────────────

/// Keyword → canonical material id. Matching picks the longest keyword
/// present as a whole word, so "white melamine" beats "melamine".
pub const MATERIAL_KEYWORDS: &[(&str, &str)] = &[
    ("white melamine", "MEL-WHT"),
    ("black melamine", "MEL-BLK"),
    ("melamine", "MEL"),
    ("mfc", "MEL"),
    ("moisture resistant mdf", "MDF-MR"),
    ("mr mdf", "MDF-MR"),
    ("mdf", "MDF"),
    ("hdf", "HDF"),
    ("birch plywood", "PLY-BIRCH"),
    ("birch ply", "PLY-BIRCH"),
    ("plywood", "PLY"),
    ("ply", "PLY"),
    ("particle board", "PB"),
    ("particleboard", "PB"),
    ("chipboard", "PB"),
    ("oak veneer", "VEN-OAK"),
    ("walnut veneer", "VEN-WAL"),
    ("veneer", "VEN"),
    ("hardboard", "HB"),
    ("osb", "OSB"),
    ("acrylic", "ACR"),
    ("laminate", "LAM"),
    ("hpl", "LAM"),
];

// ──────────────────────────────────────────────
// Label cleanup
// ──────────────────────────────────────────────

/// How aggressively a cleanup pattern may strip a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripKind {
    /// Always removed (numbers, units, counts).
    Hard,
    /// Skipped if removing it would leave no descriptive text.
    Soft,
}

/// Token removers applied in order when deriving a label from a line.
/// Material keywords are removed separately, as a soft strip.
pub static LABEL_CLEANUP_PATTERNS: LazyLock<Vec<(Regex, StripKind)>> = LazyLock::new(|| {
    let edge_codes = EDGE_PATTERNS
        .iter()
        .map(|(pattern, _)| (pattern.clone(), StripKind::Hard));
    let mut patterns = vec![
        (LABELLED_DIMENSIONS.clone(), StripKind::Hard),
        (TRIPLE_DIMENSIONS.clone(), StripKind::Hard),
        (PAIR_DIMENSIONS.clone(), StripKind::Hard),
        (
            Regex::new(r"(?i)\b(?:thk|thick(?:ness)?)\s*[:=]?\s*\d+(?:\.\d+)?\s*(?:mm)?\b|\b\d+(?:\.\d+)?\s*mm\s*(?:thk|thick(?:ness)?)?\b|\b\d+(?:\.\d+)?\s*(?:thk|thick)\b").unwrap(),
            StripKind::Hard,
        ),
        (
            Regex::new(r"(?i)\b(?:qty|quantity|qnty|count)\s*[:=#]?\s*\d+\b|\b\d+\s*(?:pcs|pc|pieces?|off|nos|units?)\b").unwrap(),
            StripKind::Hard,
        ),
        (Regex::new(r"(?i)(?:^|\s)[x×]\s*\d+\b|\b\d+\s*[x×](?:\s|$)").unwrap(), StripKind::Hard),
        (
            Regex::new(r"(?i)\bgrain\s*(?:along\s*)?(?:[:=]\s*)?(?:l|len|length|long|w|wid|width|across)\b|\balong[_\s]?(?:l|w|length|width)\b|\b(?:gl|gw|nr)\b|\bcross\s*grain\b").unwrap(),
            StripKind::Hard,
        ),
        (
            Regex::new(r"(?i)\bno\s*rot(?:ate|ation)?\b|\b(?:don'?t|do\s+not|cannot|can'?t)\s+rotate\b|\bfixed\s+grain\b").unwrap(),
            StripKind::Hard,
        ),
    ];
    // Edge phrases sit between the rotation words and the operation words.
    let ops_at = patterns.len();
    patterns.splice(ops_at..ops_at, edge_codes);
    patterns.push((
        Regex::new(r"(?i)\b(?:edge\s*band(?:ing|ed)?|banding|eb|edging|edged|groove[sd]?|dado|rebate)\b").unwrap(),
        StripKind::Soft,
    ));
    // Bare counts left behind at either end: "2 Side panel", "Shelf 3"
    patterns.push((Regex::new(r"^\s*\d+\s+|\s+\d+\s*$").unwrap(), StripKind::Hard));
    patterns
});

/// Residual punctuation trimmed from both ends of a label.
pub const LABEL_TRIM_CHARS: &[char] = &[
    ' ', ',', ';', ':', '-', '|', '/', '(', ')', '[', ']', '.', '@', '#', '*', '\t', '\u{2013}', '\u{2014}',
];

/// Maximum label length, including the ellipsis when truncated.
pub const MAX_LABEL_LEN: usize = 100;

// ──────────────────────────────────────────────
// Spoken numbers
// ──────────────────────────────────────────────

/// Spoken numeral words. `hundred` and `thousand` are multipliers.
pub const WORD_NUMBERS: &[(&str, u32)] = &[
    ("zero", 0),
    ("oh", 0),
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("thirty", 30),
    ("forty", 40),
    ("fifty", 50),
    ("sixty", 60),
    ("seventy", 70),
    ("eighty", 80),
    ("ninety", 90),
    ("hundred", 100),
    ("thousand", 1000),
];

/// Words that split a spoken phrase into length and width sides.
pub const SPOKEN_DIMENSION_CONNECTORS: &[&str] = &["by", "x", "×", "*", "times", "cross"];

/// Words that introduce a spoken quantity ("need four", "quantity of two").
pub const SPOKEN_QUANTITY_LEADS: &[&str] = &["quantity", "qty", "need", "make", "cut"];

/// Words that close a spoken quantity ("four pieces", "two off").
pub const SPOKEN_QUANTITY_TAILS: &[&str] = &["pieces", "piece", "pcs", "off", "units", "unit"];

/// Words allowed between a quantity lead and its number ("quantity of two").
pub const SPOKEN_QUANTITY_JOINERS: &[&str] = &["of", "is", "equals"];

/// Spoken unit words and their millimetre factor.
pub const SPOKEN_UNITS: &[(&str, f64)] = &[
    ("mm", 1.0),
    ("mil", 1.0),
    ("mils", 1.0),
    ("millimeter", 1.0),
    ("millimeters", 1.0),
    ("millimetre", 1.0),
    ("millimetres", 1.0),
    ("cm", 10.0),
    ("centimeter", 10.0),
    ("centimeters", 10.0),
    ("centimetre", 10.0),
    ("centimetres", 10.0),
    ("inch", 25.4),
    ("inches", 25.4),
];

/// Words that mark a spoken number as a thickness ("eighteen mil thick").
pub const SPOKEN_THICKNESS_WORDS: &[&str] = &["thick", "thickness"];

/// Groove/dado presence in a spoken phrase.
pub static SPOKEN_GROOVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:groove[sd]?|grooving|dado(?:es|s|ed)?)\b").unwrap());

/// A groove runs along the width when "width" appears anywhere in the phrase.
pub static SPOKEN_WIDTH_CUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwidth\b").unwrap());

/// Connective words dropped from a spoken label.
pub const SPOKEN_FILLER_WORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "at", "on", "with", "only", "please", "is", "equals",
    "by", "x", "times", "cross", "length", "width", "long", "wide", "thick", "thickness",
    "quantity", "qty", "need", "make", "cut", "pieces", "piece", "pcs", "off", "units", "unit",
    "mm", "mil", "mils", "millimeter", "millimeters", "millimetre", "millimetres",
    "cm", "centimeter", "centimeters", "centimetre", "centimetres", "inch", "inches",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_pattern_matches_common_forms() {
        for input in ["720x560", "720 x 560", "720 × 560", "720mm by 560mm", "28in x 16in"] {
            assert!(PAIR_DIMENSIONS.is_match(input), "no match for {input}");
        }
    }

    #[test]
    fn pair_pattern_does_not_match_words() {
        assert!(!PAIR_DIMENSIONS.is_match("six panels"));
    }

    #[test]
    fn labelled_pattern_captures_both_sides() {
        let caps = LABELLED_DIMENSIONS.captures("Length: 720, Width: 560").unwrap();
        assert_eq!(&caps[1], "720");
        assert_eq!(&caps[3], "560");
    }

    #[test]
    fn explicit_quantity_precedes_multiplier() {
        let text = "qty: 4 x2";
        let first = QUANTITY_PATTERNS
            .iter()
            .find_map(|p| p.captures(text))
            .unwrap();
        assert_eq!(&first[1], "4");
    }

    #[test]
    fn word_table_has_unique_words() {
        let mut words: Vec<&str> = WORD_NUMBERS.iter().map(|(w, _)| *w).collect();
        words.sort();
        words.dedup();
        assert_eq!(words.len(), WORD_NUMBERS.len());
    }

    #[test]
    fn thickness_band_is_ordered() {
        assert!(THICKNESS_DETECT_RANGE_MM.0 < THICKNESS_DETECT_RANGE_MM.1);
    }
}
