// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Soft moderation: mask offensive terms in assistant output when the user's
//! message is aggressive.

use amo_config::ModerationConfig;
use amo_core::{AmoError, ModerationResult, Moderator};
use regex::{Regex, RegexSet};

const MASK: &str = "[...]";

/// Masks configured offensive terms in responses to aggressive messages.
///
/// A message is aggressive when it contains an offensive term together with
/// an aggressive marker or a shouted (all-caps, four letters or more) word.
#[derive(Debug, Clone)]
pub struct SoftModerator {
    terms: Option<Regex>,
    markers: RegexSet,
    shouting: Regex,
}

impl SoftModerator {
    pub fn new(config: &ModerationConfig) -> Result<Self, AmoError> {
        let escaped: Vec<String> = config
            .offensive_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(regex::escape)
            .collect();
        let terms = if escaped.is_empty() {
            None
        } else {
            let pattern = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
            Some(Regex::new(&pattern).map_err(|e| {
                AmoError::Config(format!("invalid moderation.offensive_terms: {e}"))
            })?)
        };

        let markers = RegexSet::new(&config.aggressive_markers).map_err(|e| {
            AmoError::Config(format!("invalid moderation.aggressive_markers: {e}"))
        })?;
        let shouting = Regex::new(r"\b[A-Z]{4,}\b")
            .map_err(|e| AmoError::Internal(format!("shouting pattern: {e}")))?;

        Ok(Self {
            terms,
            markers,
            shouting,
        })
    }

    pub fn is_aggressive(&self, user_message: &str) -> bool {
        let Some(terms) = &self.terms else {
            return false;
        };
        terms.is_match(user_message)
            && (self.markers.is_match(user_message) || self.shouting.is_match(user_message))
    }
}

impl Moderator for SoftModerator {
    fn moderate(&self, user_message: &str, response_text: &str) -> ModerationResult {
        let Some(terms) = &self.terms else {
            return ModerationResult::untouched(response_text);
        };
        if response_text.is_empty() || !self.is_aggressive(user_message) {
            return ModerationResult::untouched(response_text);
        }

        let masked = terms.replace_all(response_text, MASK);
        let moderated = masked != response_text;
        ModerationResult {
            display_text: masked.into_owned(),
            original_text: response_text.to_string(),
            moderated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moderator() -> SoftModerator {
        SoftModerator::new(&ModerationConfig::default()).unwrap()
    }

    #[test]
    fn offensive_term_alone_is_not_aggressive() {
        let m = moderator();
        assert!(!m.is_aggressive("that movie was dumb"));
    }

    #[test]
    fn offensive_term_with_marker_is_aggressive() {
        let m = moderator();
        assert!(m.is_aggressive("you are stupid!!"));
        assert!(m.is_aggressive("shut up you moron"));
    }

    #[test]
    fn offensive_term_with_shouting_is_aggressive() {
        let m = moderator();
        assert!(m.is_aggressive("WHAT are you, an idiot"));
        assert!(!m.is_aggressive("WHY is this so slow"));
    }

    #[test]
    fn masks_terms_in_response_to_aggressive_message() {
        let m = moderator();
        let result = m.moderate(
            "you are STUPID!!",
            "I'm sorry you feel I'm stupid. I hate to disappoint.",
        );
        assert!(result.moderated);
        assert_eq!(
            result.display_text,
            "I'm sorry you feel I'm [...]. I [...] to disappoint."
        );
        assert_eq!(
            result.original_text,
            "I'm sorry you feel I'm stupid. I hate to disappoint."
        );
    }

    #[test]
    fn calm_message_leaves_response_untouched() {
        let m = moderator();
        let result = m.moderate("please help", "Don't call yourself stupid.");
        assert!(!result.moderated);
        assert_eq!(result.display_text, "Don't call yourself stupid.");
    }

    #[test]
    fn aggressive_message_with_clean_response_is_not_moderated() {
        let m = moderator();
        let result = m.moderate("you IDIOT!!", "Let's take a breath and try again.");
        assert!(!result.moderated);
    }

    #[test]
    fn empty_term_list_disables_moderation() {
        let config = ModerationConfig {
            offensive_terms: vec![],
            ..ModerationConfig::default()
        };
        let m = SoftModerator::new(&config).unwrap();
        assert!(!m.moderate("you IDIOT!!", "idiot").moderated);
    }
}
