//! Live dictation buffer. One instance per speaking session; fragments
//! accumulate until the speech source marks one final or the buffer grows
//! past the flush threshold, then the one-shot phrase parser runs.

use serde::{Deserialize, Serialize};

use super::parser::{parse_voice_phrase, VoiceOptions};
use crate::models::Part;
use crate::pipeline::types::ParseOutcome;

/// One transcript fragment from the speech source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub text: String,
    #[serde(default)]
    pub is_final: bool,
}

impl TranscriptFragment {
    pub fn new(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            text: text.into(),
            is_final,
        }
    }
}

/// What a session left behind when it ended.
#[derive(Debug, Clone, Default)]
pub struct DictationSummary {
    /// Part produced by the closing flush, if any.
    pub part: Option<Part>,
    /// Text that never produced a part.
    pub leftover: Option<String>,
    /// Parts emitted over the whole session, including `part`.
    pub emitted: usize,
}

/// Stateful accumulator for one dictation session.
///
/// # Example
/// ```ignore
/// let mut stream = DictationStream::new(VoiceOptions::default());
/// for fragment in fragments {
///     if let Some(part) = stream.append(&fragment.text, fragment.is_final) {
///         /* show part for review */
///     }
/// }
/// let summary = stream.finish();
/// ```
#[derive(Debug)]
pub struct DictationStream {
    options: VoiceOptions,
    buffer: String,
    emitted: usize,
}

impl DictationStream {
    pub fn new(options: VoiceOptions) -> Self {
        Self {
            options,
            buffer: String::new(),
            emitted: 0,
        }
    }

    /// Add a fragment. Flushes when the fragment is final or the buffer
    /// exceeds the threshold; returns the part if that flush produced one.
    pub fn append(&mut self, fragment: &str, is_final: bool) -> Option<Part> {
        let fragment = fragment.trim();
        if !fragment.is_empty() {
            if !self.buffer.is_empty() {
                self.buffer.push(' ');
            }
            self.buffer.push_str(fragment);
        }

        if is_final || self.buffer.chars().count() > self.options.flush_threshold_chars {
            self.flush()
        } else {
            None
        }
    }

    /// Parse the buffer now. On success the buffer is cleared; on failure
    /// it is kept so the next fragment can complete the phrase.
    pub fn flush(&mut self) -> Option<Part> {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return None;
        }
        match parse_voice_phrase(&self.buffer, &self.options) {
            Some(part) => {
                tracing::debug!(
                    chars = self.buffer.len(),
                    confidence = part.audit.confidence,
                    "Dictation flush produced a part"
                );
                self.buffer.clear();
                self.emitted += 1;
                Some(part)
            }
            None => {
                tracing::debug!(chars = self.buffer.len(), "Dictation flush found no dimensions, keeping buffer");
                None
            }
        }
    }

    /// Buffered text not yet turned into a part.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// End the session with a forced flush.
    pub fn finish(mut self) -> DictationSummary {
        let part = self.flush();
        let leftover = (!self.buffer.trim().is_empty()).then(|| self.buffer.clone());
        DictationSummary {
            part,
            leftover,
            emitted: self.emitted,
        }
    }
}

/// Run a whole recorded transcript through one session. Each emitted part
/// counts as a parsed line; leftover text at the end is one failed line
/// numbered after the fragment it ended on.
pub fn parse_transcript(fragments: &[TranscriptFragment], options: &VoiceOptions) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut stream = DictationStream::new(options.clone());

    for (idx, fragment) in fragments.iter().enumerate() {
        if let Some(mut part) = stream.append(&fragment.text, fragment.is_final) {
            part.audit.source_ref = Some(format!("fragment:{}", idx + 1));
            outcome.push_part(part);
        }
    }

    let summary = stream.finish();
    if let Some(mut part) = summary.part {
        part.audit.source_ref = Some(format!("fragment:{}", fragments.len()));
        outcome.push_part(part);
    }
    if let Some(leftover) = summary.leftover {
        outcome.push_failure(fragments.len(), &leftover, "No dimensions found");
    }

    tracing::info!(
        fragments = fragments.len(),
        parts = outcome.stats.parsed_lines,
        "Transcript parse complete"
    );
    outcome
}
