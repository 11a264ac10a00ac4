// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered through miette.
//!
//! Every [`ConfigError`] names the dotted key it concerns. When the key can be
//! found in one of the TOML documents that were loaded, the error also carries
//! a labelled span so the report points at the offending line.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key needs to be offered as a correction.
const MIN_SIMILARITY: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(amo::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the enclosing table.
        valid_keys: String,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for `{key}`: found {found}, expected {expected}")]
    #[diagnostic(code(amo::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("wrong type")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(amo::config::missing_key),
        help("add `{key} = <value>` to amo.toml")
    )]
    MissingKey { key: String },

    /// A value that parsed but breaks a semantic constraint.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(amo::config::validation))]
    Validation {
        /// Dotted path, with a `[i]` suffix for list elements.
        key: String,
        message: String,
        #[label("{message}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(amo::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
            span: None,
            src: None,
        }
    }

    /// Dotted key this error refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::UnknownKey { key, .. }
            | Self::InvalidType { key, .. }
            | Self::MissingKey { key }
            | Self::Validation { key, .. } => Some(key),
            Self::Other(_) => None,
        }
    }

    /// Whether the error points into a source document.
    pub fn has_span(&self) -> bool {
        match self {
            Self::UnknownKey { span, .. }
            | Self::InvalidType { span, .. }
            | Self::Validation { span, .. } => span.is_some(),
            Self::MissingKey { .. } | Self::Other(_) => false,
        }
    }

    /// Point a validation error at `key` in the first source that defines it.
    fn locate_in(&mut self, sources: &[ConfigSource]) {
        if let Self::Validation { key, span, src, .. } = self
            && span.is_none()
            && let Some((found, source)) = find_in_sources(sources, key)
        {
            *span = Some(found);
            *src = Some(source.named());
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// A TOML document that took part in a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// File path as figment reports it, or `<inline>` for string input.
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn inline(content: impl Into<String>) -> Self {
        Self::new("<inline>", content)
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.content.clone())
    }

    /// Span of the key named by a dotted path such as `guard.cap_window`.
    ///
    /// Tables are tracked line by line, so a key is only matched under its own
    /// header. A trailing `[i]` list index is ignored.
    pub fn locate(&self, dotted: &str) -> Option<SourceSpan> {
        let dotted = dotted.split_once('[').map_or(dotted, |(head, _)| head);
        let (table, key) = dotted.rsplit_once('.').unwrap_or(("", dotted));
        if key.is_empty() {
            return None;
        }

        let mut current = "";
        let mut offset = 0;
        for line in self.content.split_inclusive('\n') {
            let body = line.trim_start();
            let indent = line.len() - body.len();

            if let Some(header) = body.strip_prefix('[')
                && !header.starts_with('[')
                && let Some((name, _)) = header.split_once(']')
            {
                current = name.trim();
            } else if current == table
                && let Some(rest) = body.strip_prefix(key)
                && rest.trim_start().starts_with('=')
            {
                return Some(SourceSpan::new((offset + indent).into(), key.len()));
            }
            offset += line.len();
        }
        None
    }
}

fn find_in_sources<'a>(
    sources: &'a [ConfigSource],
    dotted: &str,
) -> Option<(SourceSpan, &'a ConfigSource)> {
    sources
        .iter()
        .find_map(|source| source.locate(dotted).map(|span| (span, source)))
}

/// Attach source spans to validation errors.
///
/// `sources` are ordered highest precedence first, so the span lands on the
/// definition that won the merge.
pub fn attach_spans(errors: &mut [ConfigError], sources: &[ConfigSource]) {
    for error in errors {
        error.locate_in(sources);
    }
}

/// Turn a figment extraction failure into diagnostics, one per underlying error.
pub fn from_figment(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let table: Vec<String> = error.path.iter().map(ToString::to_string).collect();
            let origin = origin_of(&error, sources);

            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let dotted = join_key(&table, field);
                    let (span, src) = spanned(origin, &dotted);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: join_key(&table, field),
                },
                Kind::InvalidType(found, expected) => {
                    let dotted = table.join(".");
                    let (span, src) = spanned(origin, &dotted);
                    ConfigError::InvalidType {
                        key: dotted,
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// The loaded document a figment error came from, if we have its text.
fn origin_of<'a>(
    error: &figment::Error,
    sources: &'a [ConfigSource],
) -> Option<&'a ConfigSource> {
    let metadata = error.metadata.as_ref()?;
    match metadata.source.as_ref() {
        Some(figment::Source::File(path)) => {
            let path = path.display().to_string();
            sources.iter().find(|s| s.name == path)
        }
        // String providers carry no path; a single inline document is unambiguous.
        _ => match sources {
            [only] if only.name == "<inline>" => Some(only),
            _ => None,
        },
    }
}

fn spanned(
    origin: Option<&ConfigSource>,
    dotted: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    origin
        .and_then(|source| source.locate(dotted).map(|span| (span, source.named())))
        .map_or((None, None), |(span, src)| (Some(span), Some(src)))
}

fn join_key(table: &[String], field: &str) -> String {
    if table.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", table.join("."))
    }
}

/// Closest known key to `unknown` by Jaro-Winkler similarity, if any is close.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > MIN_SIMILARITY)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print every error to stderr as a miette report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_at(source: &ConfigSource, span: SourceSpan) -> &str {
        &source.content[span.offset()..span.offset() + span.len()]
    }

    #[test]
    fn suggests_close_key() {
        let valid = &["cap_window", "history_len", "rate_window_secs"];
        assert_eq!(
            suggest_key("cap_windw", valid),
            Some("cap_window".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["cap_window", "history_len", "rate_window_secs"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn locates_key_under_its_own_table() {
        let source = ConfigSource::inline(
            "[fallback]\nprimary_timeout_ms = 5\n\n[guard]\nhistory_len = 2\n",
        );
        let span = source.locate("guard.history_len").unwrap();
        assert_eq!(text_at(&source, span), "history_len");
        assert_eq!(span.offset(), source.content.rfind("history_len").unwrap());
    }

    #[test]
    fn same_key_in_other_table_is_not_matched() {
        let source = ConfigSource::inline("[fallback]\ncap_window = 1\n\n[guard]\n");
        assert!(source.locate("guard.cap_window").is_none());
    }

    #[test]
    fn locate_handles_crlf_and_indexes() {
        let source = ConfigSource::inline(
            "[ moderation ]\r\noffensive_terms = [\"\", \"x\"]\r\n",
        );
        let span = source.locate("moderation.offensive_terms[0]").unwrap();
        assert_eq!(text_at(&source, span), "offensive_terms");
    }

    #[test]
    fn top_level_key_is_located_before_any_table() {
        let source = ConfigSource::inline("name = 1\n[log]\nname = 2\n");
        assert_eq!(source.locate("name").unwrap().offset(), 0);
    }

    #[test]
    fn attach_spans_prefers_first_source() {
        let local = ConfigSource::new("./amo.toml", "[guard]\ncap_window = 0\n");
        let system = ConfigSource::new("/etc/amo/amo.toml", "[guard]\n\ncap_window = 9\n");
        let mut errors = vec![
            ConfigError::validation("guard.cap_window", "must be at least 1"),
            ConfigError::validation("telemetry.queue_capacity", "must be at least 1"),
        ];
        attach_spans(&mut errors, &[local.clone(), system]);

        match &errors[0] {
            ConfigError::Validation {
                span: Some(span),
                src: Some(src),
                ..
            } => {
                assert_eq!(src.name(), "./amo.toml");
                assert_eq!(text_at(&local, *span), "cap_window");
            }
            other => panic!("expected located validation error, got {other:?}"),
        }
        assert!(!errors[1].has_span());
    }
}
