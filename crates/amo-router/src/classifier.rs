// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic intent classification.
//!
//! Classifies chat messages into Casual/Normal/Coding/VisionRequest using
//! fixed rules over the text. No network, no randomness, no state.

use amo_config::ClassifierConfig;
use amo_core::{AmoError, Intent};
use regex::{Regex, RegexSet};

/// Fraction of non-whitespace characters that may be ASCII punctuation
/// before a short message stops counting as casual.
const PUNCTUATION_HEAVY_RATIO: f64 = 0.3;

/// Short messages with at most this many words count as casual even without
/// a greeting phrase.
const CASUAL_MAX_WORDS: usize = 2;

/// Deterministic intent classifier built from [`ClassifierConfig`].
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    long_prompt_chars: usize,
    casual_max_chars: usize,
    coding_keywords: Option<Regex>,
    casual_phrases: Option<Regex>,
    stack_traces: RegexSet,
}

impl IntentClassifier {
    /// Compile the configured keyword lists and stack-trace patterns.
    pub fn new(config: &ClassifierConfig) -> Result<Self, AmoError> {
        let stack_traces = RegexSet::new(&config.stack_trace_patterns).map_err(|e| {
            AmoError::Config(format!("invalid classifier.stack_trace_patterns: {e}"))
        })?;

        Ok(Self {
            long_prompt_chars: config.long_prompt_chars,
            casual_max_chars: config.casual_max_chars,
            coding_keywords: word_alternation(&config.coding_keywords, "coding_keywords")?,
            casual_phrases: word_alternation(&config.casual_phrases, "casual_phrases")?,
            stack_traces,
        })
    }

    /// Classify a message. Rules are applied in order and the first match wins:
    /// image context, coding signals, casual chat, then normal.
    pub fn classify(&self, message: &str, has_image_context: bool) -> Intent {
        if has_image_context {
            return Intent::VisionRequest;
        }

        let text = message.trim();
        if text.is_empty() {
            return Intent::Normal;
        }

        if self.is_coding(text) {
            Intent::Coding
        } else if self.is_casual(text) {
            Intent::Casual
        } else {
            Intent::Normal
        }
    }

    fn is_coding(&self, text: &str) -> bool {
        text.contains("```")
            || self.stack_traces.is_match(text)
            || self
                .coding_keywords
                .as_ref()
                .is_some_and(|re| re.is_match(text))
            || text.chars().count() > self.long_prompt_chars
    }

    fn is_casual(&self, text: &str) -> bool {
        if text.chars().count() > self.casual_max_chars || punctuation_heavy(text) {
            return false;
        }

        let phrase = self
            .casual_phrases
            .as_ref()
            .is_some_and(|re| re.is_match(text));
        let terse = text.split_whitespace().count() <= CASUAL_MAX_WORDS && !text.ends_with('?');
        phrase || terse
    }
}

/// Build a case-insensitive, word-bounded alternation, or `None` for an empty list.
fn word_alternation(words: &[String], key: &str) -> Result<Option<Regex>, AmoError> {
    let escaped: Vec<String> = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }

    let pattern = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| AmoError::Config(format!("invalid classifier.{key}: {e}")))
}

fn punctuation_heavy(text: &str) -> bool {
    let (mut visible, mut punct) = (0usize, 0usize);
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if c.is_ascii_punctuation() {
            punct += 1;
        }
    }
    visible > 0 && (punct as f64 / visible as f64) > PUNCTUATION_HEAVY_RATIO
}
