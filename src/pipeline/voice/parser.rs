use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::numbers::{segment_number_words, spoken_words, word_value, PAUSE};
use crate::models::{Grain, Groove, Part, PartSize, SourceMethod, DEFAULT_THICKNESS_MM};
use crate::pipeline::patterns::{
    GRAIN_LENGTH_PATTERNS, GRAIN_WIDTH_PATTERNS, MATERIAL_KEYWORDS, NO_ROTATE_PATTERNS,
    QUANTITY_RANGE, SPOKEN_DIMENSION_CONNECTORS, SPOKEN_FILLER_WORDS, SPOKEN_GROOVE,
    SPOKEN_QUANTITY_JOINERS, SPOKEN_QUANTITY_LEADS, SPOKEN_QUANTITY_TAILS,
    SPOKEN_THICKNESS_WORDS, SPOKEN_UNITS, SPOKEN_WIDTH_CUE, THICKNESS_DETECT_RANGE_MM,
};
use crate::pipeline::primitives::{
    any_match, are_dimensions_reasonable, calculate_confidence, clean_label,
    find_material_match, parse_edges, truncate_label, ConfidenceFlags,
};
use crate::pipeline::patterns::MAX_LABEL_LEN;

/// Largest count accepted from a bare trailing number with no quantity word.
const TRAILING_QUANTITY_MAX: u32 = 100;

/// Options for spoken-phrase parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceOptions {
    pub default_thickness_mm: f64,
    pub default_material_id: Option<String>,
    pub allow_rotation_default: bool,
    /// Put the larger spoken value in `L`. Dictation carries no grain cue,
    /// so this defaults on for the voice channel only.
    pub swap_to_landscape: bool,
    pub groove_depth_mm: f64,
    pub groove_width_mm: f64,
    pub groove_offset_mm: f64,
    /// Buffered transcript length (chars) that forces a parse attempt.
    pub flush_threshold_chars: usize,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            default_thickness_mm: DEFAULT_THICKNESS_MM,
            default_material_id: None,
            allow_rotation_default: true,
            swap_to_landscape: true,
            groove_depth_mm: 8.0,
            groove_width_mm: 4.0,
            groove_offset_mm: 10.0,
            flush_threshold_chars: 200,
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    word: String,
    value: Option<f64>,
}

/// Consecutive number words, combined into one value.
#[derive(Debug, Clone, Copy)]
struct NumberRun {
    start: usize,
    end: usize,
    value: f64,
}

#[derive(Debug, Clone)]
struct SpokenDimensions {
    first: f64,
    second: f64,
    span: Range<usize>,
}

/// Tokenized phrase with its number runs precomputed.
struct Phrase {
    tokens: Vec<Token>,
    runs: Vec<NumberRun>,
    text: String,
}

impl Phrase {
    fn new(text: &str) -> Self {
        let tokens: Vec<Token> = spoken_words(text)
            .into_iter()
            .map(|word| Token {
                value: word_value(&word),
                word,
            })
            .collect();
        let runs = number_runs(&tokens);
        let text = tokens
            .iter()
            .map(|t| t.word.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { tokens, runs, text }
    }

    fn word(&self, idx: usize) -> Option<&str> {
        self.tokens.get(idx).map(|t| t.word.as_str())
    }

    fn unit_at(&self, idx: usize) -> Option<f64> {
        let word = self.word(idx)?;
        SPOKEN_UNITS
            .iter()
            .find(|(unit, _)| *unit == word)
            .map(|(_, factor)| *factor)
    }

    /// Unit words and pauses may sit between a number and its connector.
    fn is_gap(&self, idx: usize) -> bool {
        self.unit_at(idx).is_some() || self.word(idx) == Some(PAUSE)
    }

    fn is_filler(&self, idx: usize) -> bool {
        self.word(idx)
            .is_some_and(|w| w == PAUSE || SPOKEN_FILLER_WORDS.contains(&w))
    }
}

fn number_runs(tokens: &[Token]) -> Vec<NumberRun> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].value.is_none() {
            i += 1;
            continue;
        }
        // (token index, value) for each number word in the run
        let mut members: Vec<(usize, f64)> = Vec::new();
        while i < tokens.len() {
            if let Some(value) = tokens[i].value {
                members.push((i, value));
                i += 1;
            } else if tokens[i].word == "and"
                && tokens.get(i + 1).is_some_and(|t| t.value.is_some())
            {
                i += 1;
            } else {
                break;
            }
        }
        let values: Vec<f64> = members.iter().map(|(_, v)| *v).collect();
        let mut offset = 0;
        for (count, value) in segment_number_words(&values) {
            runs.push(NumberRun {
                start: members[offset].0,
                end: members[offset + count - 1].0 + 1,
                value,
            });
            offset += count;
        }
    }
    runs
}

/// Split on the first connector with a number run on each side. Unit words
/// may sit between a run and the connector; a unit spoken only on the
/// second side applies to both.
fn find_dimensions(phrase: &Phrase) -> Option<SpokenDimensions> {
    for (k, token) in phrase.tokens.iter().enumerate() {
        if !SPOKEN_DIMENSION_CONNECTORS.contains(&token.word.as_str()) {
            continue;
        }
        let left = phrase
            .runs
            .iter()
            .rev()
            .find(|r| r.end <= k && (r.end..k).all(|i| phrase.is_gap(i)));
        let right = phrase
            .runs
            .iter()
            .find(|r| r.start > k && (k + 1..r.start).all(|i| phrase.is_gap(i)));
        let (Some(left), Some(right)) = (left, right) else {
            continue;
        };

        let left_unit = phrase.unit_at(left.end);
        let right_unit = phrase.unit_at(right.end);
        let first = left.value * left_unit.or(right_unit).unwrap_or(1.0);
        let second = right.value * right_unit.or(left_unit).unwrap_or(1.0);
        if !(first.is_finite() && second.is_finite() && first > 0.0 && second > 0.0) {
            continue;
        }
        let end = if right_unit.is_some() { right.end + 1 } else { right.end };
        return Some(SpokenDimensions {
            first,
            second,
            span: left.start..end,
        });
    }
    None
}

/// "eighteen mil thick", "thickness eighteen".
fn find_thickness(phrase: &Phrase, used: &[bool]) -> Option<(f64, Range<usize>)> {
    let (min, max) = THICKNESS_DETECT_RANGE_MM;
    phrase.runs.iter().filter(|r| !used[r.start]).find_map(|run| {
        let factor = phrase.unit_at(run.end);
        let after = if factor.is_some() { run.end + 1 } else { run.end };
        let value = run.value * factor.unwrap_or(1.0);

        let trailing = phrase
            .word(after)
            .is_some_and(|w| SPOKEN_THICKNESS_WORDS.contains(&w));
        let leading = run.start > 0
            && phrase
                .word(run.start - 1)
                .is_some_and(|w| SPOKEN_THICKNESS_WORDS.contains(&w));

        let end = if trailing { after + 1 } else { after };
        ((trailing || leading) && (min..=max).contains(&value)).then_some((value, run.start..end))
    })
}

/// Explicit lead and tail words first, then a trailing number near the end.
fn find_quantity(phrase: &Phrase, used: &[bool]) -> Option<u32> {
    let free = |r: &&NumberRun| !used[r.start];

    for (i, token) in phrase.tokens.iter().enumerate() {
        if !SPOKEN_QUANTITY_LEADS.contains(&token.word.as_str()) {
            continue;
        }
        let mut j = i + 1;
        while phrase
            .word(j)
            .is_some_and(|w| SPOKEN_QUANTITY_JOINERS.contains(&w))
        {
            j += 1;
        }
        if let Some(qty) = phrase
            .runs
            .iter()
            .filter(free)
            .find(|r| r.start == j)
            .and_then(|r| as_count(r.value, QUANTITY_RANGE.1))
        {
            return Some(qty);
        }
    }

    let tailed = phrase.runs.iter().filter(free).find(|r| {
        phrase
            .word(r.end)
            .is_some_and(|w| SPOKEN_QUANTITY_TAILS.contains(&w))
    });
    if let Some(qty) = tailed.and_then(|r| as_count(r.value, QUANTITY_RANGE.1)) {
        return Some(qty);
    }

    let len = phrase.tokens.len();
    phrase
        .runs
        .iter()
        .filter(free)
        .rev()
        .find(|r| len - r.end <= 2 && (r.end..len).all(|i| phrase.is_filler(i)))
        .and_then(|r| as_count(r.value, TRAILING_QUANTITY_MAX))
}

fn as_count(value: f64, max: u32) -> Option<u32> {
    (value.fract() == 0.0 && value >= f64::from(QUANTITY_RANGE.0) && value <= f64::from(max))
        .then_some(value as u32)
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

fn spoken_label(phrase: &Phrase, used: &[bool], material_keyword: Option<&str>) -> Option<String> {
    let leftover = phrase
        .tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| !used[*i] && t.value.is_none() && t.word != PAUSE)
        .map(|(_, t)| t.word.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned = clean_label(&leftover, material_keyword)?;
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|w| !SPOKEN_FILLER_WORDS.contains(w))
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(truncate_label(&words.join(" "), MAX_LABEL_LEN))
}

/// Parse one complete spoken phrase. `None` when no dimensions are found.
pub fn parse_voice_phrase(text: &str, options: &VoiceOptions) -> Option<Part> {
    let phrase = Phrase::new(text);
    let dims = find_dimensions(&phrase)?;

    let (l, w) = if options.swap_to_landscape && dims.second > dims.first {
        (dims.second, dims.first)
    } else {
        (dims.first, dims.second)
    };

    let mut used = vec![false; phrase.tokens.len()];
    used[dims.span.clone()].iter_mut().for_each(|u| *u = true);

    let thickness = find_thickness(&phrase, &used).map(|(value, span)| {
        used[span].iter_mut().for_each(|u| *u = true);
        value
    });
    let qty = find_quantity(&phrase, &used);

    let without_articles = phrase.text.replace(" the ", " ");
    let grain = detect_grain(&without_articles);
    let no_rotate = any_match(&NO_ROTATE_PATTERNS, &phrase.text);
    let edges = parse_edges(&phrase.text);
    let material = find_material_match(&phrase.text, MATERIAL_KEYWORDS);
    let label = spoken_label(&phrase, &used, material.map(|m| m.keyword));

    let mut part = Part::new(l, w, SourceMethod::Voice);
    part.qty = qty.unwrap_or(1);
    part.thickness_mm = thickness.unwrap_or(options.default_thickness_mm);
    part.material_id = match material {
        Some(m) => m.material_id.to_string(),
        None => options.default_material_id.clone().unwrap_or_default(),
    };
    part.label = label;
    part.set_orientation(grain, no_rotate, options.allow_rotation_default);
    part.set_edges(&edges);
    if SPOKEN_GROOVE.is_match(&phrase.text) {
        let side = if SPOKEN_WIDTH_CUE.is_match(&phrase.text) { "W1" } else { "L1" };
        part.add_groove(Groove {
            side: side.to_string(),
            depth_mm: options.groove_depth_mm,
            width_mm: options.groove_width_mm,
            offset_mm: options.groove_offset_mm,
        });
    }
    part.raw_text = Some(text.to_string());

    let flags = ConfidenceFlags {
        has_dimensions: true,
        has_quantity: qty.is_some(),
        has_label: part.label.is_some(),
        has_material: material.is_some(),
        has_thickness: thickness.is_some(),
        dimensions_reasonable: are_dimensions_reasonable(l, w),
    };
    part.set_confidence(calculate_confidence(&flags));
    Some(part)
}

/// Spoken dimensions with the voice convention applied: the larger value is `L`.
pub fn parse_spoken_dimensions(text: &str) -> Option<PartSize> {
    let dims = find_dimensions(&Phrase::new(text))?;
    Some(PartSize {
        l: dims.first.max(dims.second),
        w: dims.first.min(dims.second),
    })
}

/// Quantity in a spoken phrase, ignoring the numbers used as dimensions.
pub fn parse_spoken_quantity(text: &str) -> Option<u32> {
    let phrase = Phrase::new(text);
    let mut used = vec![false; phrase.tokens.len()];
    if let Some(dims) = find_dimensions(&phrase) {
        used[dims.span].iter_mut().for_each(|u| *u = true);
    }
    find_quantity(&phrase, &used)
}
