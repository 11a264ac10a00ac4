// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Adaptive Model Optimizer.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level AMO configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AmoConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Intent classifier thresholds and pattern lists.
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Cost guard cap and rate limits.
    #[serde(default)]
    pub guard: GuardConfig,

    /// Per-attempt provider deadlines.
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Telemetry queue and sink settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Soft moderation of assistant output.
    #[serde(default)]
    pub moderation: ModerationConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Intent classifier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Messages longer than this many characters are treated as coding work.
    #[serde(default = "default_long_prompt_chars")]
    pub long_prompt_chars: usize,

    /// Messages at or below this many characters may be casual chat.
    #[serde(default = "default_casual_max_chars")]
    pub casual_max_chars: usize,

    /// Words that signal coding or debugging, matched on word boundaries.
    #[serde(default = "default_coding_keywords")]
    pub coding_keywords: Vec<String>,

    /// Greeting and small-talk phrases, matched on word boundaries.
    #[serde(default = "default_casual_phrases")]
    pub casual_phrases: Vec<String>,

    /// Regular expressions recognizing stack traces and error dumps.
    #[serde(default = "default_stack_trace_patterns")]
    pub stack_trace_patterns: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            long_prompt_chars: default_long_prompt_chars(),
            casual_max_chars: default_casual_max_chars(),
            coding_keywords: default_coding_keywords(),
            casual_phrases: default_casual_phrases(),
            stack_trace_patterns: default_stack_trace_patterns(),
        }
    }
}

fn default_long_prompt_chars() -> usize {
    2000
}

fn default_casual_max_chars() -> usize {
    60
}

fn default_coding_keywords() -> Vec<String> {
    [
        "code",
        "function",
        "api",
        "algorithm",
        "class",
        "python",
        "javascript",
        "typescript",
        "sql",
        "react",
        "refactor",
        "implement",
        "debug",
        "bug",
        "error",
        "traceback",
        "stack",
        "exception",
        "crash",
        "failing",
        "failure",
        "fix",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_casual_phrases() -> Vec<String> {
    [
        "hi",
        "hello",
        "hey",
        "yo",
        "sup",
        "good morning",
        "good evening",
        "thanks",
        "thank you",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_stack_trace_patterns() -> Vec<String> {
    [
        r"Traceback \(most recent call last\)",
        r#"File "[^"]+", line \d+"#,
        r"(?m)^\s*at [\w$.<>]+\(.*\)",
        r"panicked at",
        r"(?m)^\s*\w*(Error|Exception):",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Cost guard configuration: consecutive high-cost cap and rate windows.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Consecutive high-cost commits allowed before the next is downgraded.
    #[serde(default = "default_cap_window")]
    pub cap_window: usize,

    /// Number of committed tiers kept per session.
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Trailing window for request-rate counting, in seconds.
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Requests per window per session before high-cost tiers are refused.
    /// `None` disables the session limit.
    #[serde(default = "default_session_rate_limit")]
    pub session_rate_limit: Option<usize>,

    /// Requests per window across all sessions before high-cost tiers are refused.
    /// `None` disables the global limit.
    #[serde(default = "default_global_rate_limit")]
    pub global_rate_limit: Option<usize>,

    /// Sessions idle longer than this are evicted by the sweeper.
    #[serde(default = "default_session_idle_timeout_secs")]
    pub session_idle_timeout_secs: u64,

    /// How often the idle sweeper runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cap_window: default_cap_window(),
            history_len: default_history_len(),
            rate_window_secs: default_rate_window_secs(),
            session_rate_limit: default_session_rate_limit(),
            global_rate_limit: default_global_rate_limit(),
            session_idle_timeout_secs: default_session_idle_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_cap_window() -> usize {
    3
}

fn default_history_len() -> usize {
    8
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_session_rate_limit() -> Option<usize> {
    Some(20)
}

fn default_global_rate_limit() -> Option<usize> {
    Some(600)
}

fn default_session_idle_timeout_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Provider attempt deadlines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Deadline for the attempt at the selected tier, in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub primary_timeout_ms: u64,

    /// Deadline for the standard-tier retry, in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub fallback_timeout_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            primary_timeout_ms: default_attempt_timeout_ms(),
            fallback_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

fn default_attempt_timeout_ms() -> u64 {
    10_000
}

/// Where telemetry records end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Structured log line per record.
    #[default]
    Tracing,
    /// Append-only SQLite table.
    Sqlite,
    /// Discard records.
    #[serde(rename = "none")]
    Disabled,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Bounded queue capacity between request tasks and the sink worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Sink that receives drained records.
    #[serde(default)]
    pub sink: SinkKind,

    /// SQLite database path, required when `sink = "sqlite"`.
    #[serde(default)]
    pub database_path: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            sink: SinkKind::default(),
            database_path: None,
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

/// Soft moderation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModerationConfig {
    /// Whether assistant output is masked for aggressive conversations.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Terms masked in assistant output when the user is aggressive.
    #[serde(default = "default_offensive_terms")]
    pub offensive_terms: Vec<String>,

    /// Regular expressions marking an aggressive user message.
    #[serde(default = "default_aggressive_markers")]
    pub aggressive_markers: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offensive_terms: default_offensive_terms(),
            aggressive_markers: default_aggressive_markers(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_offensive_terms() -> Vec<String> {
    [
        "idiot", "stupid", "moron", "dumb", "trash", "hate", "loser", "screw",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_aggressive_markers() -> Vec<String> {
    vec![
        r"!{2,}".to_string(),
        r"(?i)\b(shut up|kill|attack|worthless)\b".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_defaults_match_documented_values() {
        let guard = GuardConfig::default();
        assert_eq!(guard.cap_window, 3);
        assert_eq!(guard.history_len, 8);
        assert_eq!(guard.rate_window_secs, 60);
        assert_eq!(guard.session_rate_limit, Some(20));
        assert_eq!(guard.global_rate_limit, Some(600));
    }

    #[test]
    fn sink_kind_serializes_lowercase() {
        let toml = toml::to_string(&TelemetryConfig::default()).unwrap();
        assert!(toml.contains("sink = \"tracing\""));
    }

    #[test]
    fn default_stack_trace_patterns_compile() {
        for pattern in default_stack_trace_patterns() {
            assert!(regex::Regex::new(&pattern).is_ok(), "{pattern}");
        }
    }
}
