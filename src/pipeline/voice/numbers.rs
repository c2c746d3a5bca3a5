//! Spoken-number parsing: digits, number words and the compound forms
//! dictation produces ("five sixty", "twenty five", "seven twenty five").

use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::patterns::WORD_NUMBERS;
use crate::pipeline::primitives::normalize;

/// Token that marks a pause (comma, semicolon, ...). Number runs break on it.
pub const PAUSE: &str = ",";

static THOUSANDS_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d),(\d{3})\b").unwrap());

/// Normalize a transcript and split it into words. Hyphens become spaces,
/// clause punctuation becomes a standalone pause token, and a trailing
/// sentence period is dropped.
pub fn spoken_words(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    let joined = THOUSANDS_SEPARATOR.replace_all(&normalized, "$1$2");
    let mut spaced = String::with_capacity(joined.len());
    for c in joined.chars() {
        match c {
            '-' => spaced.push(' '),
            ',' | ';' | ':' | '!' | '?' => {
                spaced.push(' ');
                spaced.push_str(PAUSE);
                spaced.push(' ');
            }
            other => spaced.push(other),
        }
    }
    spaced
        .split_whitespace()
        .map(|w| w.trim_end_matches('.'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Numeric value of one word: a numeral ("720", "72.5") or a number word.
pub fn word_value(word: &str) -> Option<f64> {
    if word.starts_with(|c: char| c.is_ascii_digit()) {
        return word.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0);
    }
    WORD_NUMBERS
        .iter()
        .find(|(w, _)| *w == word)
        .map(|(_, v)| f64::from(*v))
}

/// Parse a phrase made only of number words (and "and") into one value.
///
/// Returns `None` if any other word is present or nothing is left.
pub fn parse_spoken_number(text: &str) -> Option<f64> {
    let mut values = Vec::new();
    for word in spoken_words(text) {
        if word == "and" || word == PAUSE {
            continue;
        }
        values.push(word_value(&word)?);
    }
    combine_number_words(&values)
}

/// Combine number-word values that form a single spoken number.
///
/// - "five sixty": a single digit followed by a value in [10, 100) is
///   hundreds plus remainder (560).
/// - "twenty five": a value in [20, 100) followed by a unit is additive (25).
/// - "seven twenty five" / "seven oh five": digit, tens (or zero), unit (725, 705).
/// - Anything else accumulates, with "hundred" and "thousand" multiplying.
pub fn combine_number_words(values: &[f64]) -> Option<f64> {
    match *values {
        [] => None,
        [a] => Some(a),
        [a, b] if is_hundreds_pair(a, b) => Some(a * 100.0 + b),
        [a, b] if is_tens_pair(a, b) => Some(a + b),
        [a, b, c] if is_hundreds_triple(a, b, c) => Some(a * 100.0 + b + c),
        _ => Some(accumulate(values)),
    }
}

/// Split a run of number-word values into the consecutive numbers a
/// speaker most likely meant: "five sixty eighteen" is 560 then 18, and
/// "four seven twenty" is 4 then 720. Runs containing "hundred" or
/// "thousand" are read as one number. Returns (word count, value) pairs.
pub fn segment_number_words(values: &[f64]) -> Vec<(usize, f64)> {
    if values.iter().any(|v| *v == 100.0 || *v == 1000.0) {
        return vec![(values.len(), accumulate(values))];
    }
    let mut segments = Vec::new();
    let mut rest = values;
    while !rest.is_empty() {
        let take = match *rest {
            [a, b, c, ..] if is_hundreds_triple(a, b, c) => 3,
            [a, b, ..] if is_hundreds_pair(a, b) || is_tens_pair(a, b) => 2,
            _ => 1,
        };
        if let Some(value) = combine_number_words(&rest[..take]) {
            segments.push((take, value));
        }
        rest = &rest[take..];
    }
    segments
}

/// Running accumulation: add into `current`, multiply on "hundred",
/// flush into `result` on "thousand".
fn accumulate(values: &[f64]) -> f64 {
    let mut result: f64 = 0.0;
    let mut current: f64 = 0.0;
    for &value in values {
        if value == 100.0 {
            current = current.max(1.0) * 100.0;
        } else if value == 1000.0 {
            result += current.max(1.0) * 1000.0;
            current = 0.0;
        } else {
            current += value;
        }
    }
    result + current
}

fn is_hundreds_pair(a: f64, b: f64) -> bool {
    is_digit(a) && (10.0..100.0).contains(&b)
}

fn is_tens_pair(a: f64, b: f64) -> bool {
    (20.0..100.0).contains(&a) && is_unit(b)
}

fn is_hundreds_triple(a: f64, b: f64, c: f64) -> bool {
    is_digit(a) && (is_tens(b) || b == 0.0) && is_digit(c)
}

fn is_digit(value: f64) -> bool {
    value.fract() == 0.0 && (1.0..10.0).contains(&value)
}

fn is_unit(value: f64) -> bool {
    value.fract() == 0.0 && (0.0..10.0).contains(&value)
}

fn is_tens(value: f64) -> bool {
    (20.0..100.0).contains(&value) && value % 10.0 == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(text: &str) -> Option<f64> {
        parse_spoken_number(text)
    }

    #[test]
    fn compound_hundreds() {
        assert_eq!(num("five sixty"), Some(560.0));
        assert_eq!(num("seven twenty"), Some(720.0));
        assert_eq!(num("three fifteen"), Some(315.0));
    }

    #[test]
    fn compound_tens_and_units() {
        assert_eq!(num("twenty five"), Some(25.0));
        assert_eq!(num("twenty-five"), Some(25.0));
        assert_eq!(num("ninety nine"), Some(99.0));
    }

    #[test]
    fn three_word_compound() {
        assert_eq!(num("seven twenty five"), Some(725.0));
        assert_eq!(num("seven oh five"), Some(705.0));
    }

    #[test]
    fn standard_accumulation() {
        assert_eq!(num("seven hundred and twenty"), Some(720.0));
        assert_eq!(num("two thousand four hundred"), Some(2400.0));
        assert_eq!(num("twenty five hundred"), Some(2500.0));
        assert_eq!(num("eighteen"), Some(18.0));
        assert_eq!(accumulate(&[2.0, 1000.0, 5.0, 100.0]), 2500.0);
        assert_eq!(accumulate(&[100.0]), 100.0);
    }

    #[test]
    fn numerals_pass_through() {
        assert_eq!(num("720"), Some(720.0));
        assert_eq!(num("72.5"), Some(72.5));
        assert_eq!(num("1,200"), Some(1200.0));
    }

    #[test]
    fn non_numbers_are_rejected() {
        assert_eq!(num("banana"), None);
        assert_eq!(num("five bananas"), None);
        assert_eq!(num(""), None);
    }

    #[test]
    fn segments_split_adjacent_numbers() {
        assert_eq!(segment_number_words(&[5.0, 60.0, 18.0]), vec![(2, 560.0), (1, 18.0)]);
        assert_eq!(segment_number_words(&[4.0, 7.0, 20.0]), vec![(1, 4.0), (2, 720.0)]);
        assert_eq!(segment_number_words(&[400.0, 10.0]), vec![(1, 400.0), (1, 10.0)]);
        assert_eq!(segment_number_words(&[7.0, 100.0, 20.0]), vec![(3, 720.0)]);
    }

    #[test]
    fn words_mark_pauses() {
        assert_eq!(
            spoken_words("Seven-twenty, by five sixty."),
            ["seven", "twenty", ",", "by", "five", "sixty"]
        );
    }
}
