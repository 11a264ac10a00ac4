// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as positive thresholds, compilable patterns, and sink prerequisites.

use crate::diagnostic::ConfigError;
use crate::model::{AmoConfig, SinkKind};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &AmoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.log.level.trim().to_ascii_lowercase();
    if !matches!(
        level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        errors.push(invalid(
            "log.level",
            format!(
                "must be one of trace, debug, info, warn, error, got `{}`",
                config.log.level
            ),
        ));
    }

    let classifier = &config.classifier;
    if classifier.long_prompt_chars == 0 {
        errors.push(invalid("classifier.long_prompt_chars", "must be greater than 0"));
    }
    if classifier.casual_max_chars == 0 {
        errors.push(invalid("classifier.casual_max_chars", "must be greater than 0"));
    }
    check_non_blank(
        "classifier.coding_keywords",
        &classifier.coding_keywords,
        &mut errors,
    );
    check_non_blank(
        "classifier.casual_phrases",
        &classifier.casual_phrases,
        &mut errors,
    );
    check_patterns(
        "classifier.stack_trace_patterns",
        &classifier.stack_trace_patterns,
        &mut errors,
    );

    let guard = &config.guard;
    if guard.cap_window == 0 {
        errors.push(invalid("guard.cap_window", "must be at least 1"));
    }
    let min_history = guard.cap_window.max(3);
    if guard.history_len < min_history {
        errors.push(invalid(
            "guard.history_len",
            format!(
                "must be at least {min_history} (max of cap_window and 3), got {}",
                guard.history_len
            ),
        ));
    }
    if guard.rate_window_secs == 0 {
        errors.push(invalid("guard.rate_window_secs", "must be greater than 0"));
    }
    if guard.session_rate_limit == Some(0) {
        errors.push(invalid("guard.session_rate_limit", "must be at least 1 when set"));
    }
    if guard.global_rate_limit == Some(0) {
        errors.push(invalid("guard.global_rate_limit", "must be at least 1 when set"));
    }
    if guard.session_idle_timeout_secs == 0 {
        errors.push(invalid(
            "guard.session_idle_timeout_secs",
            "must be greater than 0",
        ));
    }
    if guard.sweep_interval_secs == 0 {
        errors.push(invalid("guard.sweep_interval_secs", "must be greater than 0"));
    }

    if config.fallback.primary_timeout_ms == 0 {
        errors.push(invalid("fallback.primary_timeout_ms", "must be greater than 0"));
    }
    if config.fallback.fallback_timeout_ms == 0 {
        errors.push(invalid("fallback.fallback_timeout_ms", "must be greater than 0"));
    }

    let telemetry = &config.telemetry;
    if telemetry.queue_capacity == 0 {
        errors.push(invalid("telemetry.queue_capacity", "must be at least 1"));
    }
    if telemetry.sink == SinkKind::Sqlite
        && telemetry
            .database_path
            .as_deref()
            .is_none_or(|p| p.trim().is_empty())
    {
        errors.push(invalid(
            "telemetry.database_path",
            "must be set when telemetry.sink = \"sqlite\"",
        ));
    }

    check_non_blank(
        "moderation.offensive_terms",
        &config.moderation.offensive_terms,
        &mut errors,
    );
    check_patterns(
        "moderation.aggressive_markers",
        &config.moderation.aggressive_markers,
        &mut errors,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::validation(key, message)
}

fn check_non_blank(key: &str, entries: &[String], errors: &mut Vec<ConfigError>) {
    for (i, entry) in entries.iter().enumerate() {
        if entry.trim().is_empty() {
            errors.push(invalid(&format!("{key}[{i}]"), "must not be empty"));
        }
    }
}

fn check_patterns(key: &str, patterns: &[String], errors: &mut Vec<ConfigError>) {
    for (i, pattern) in patterns.iter().enumerate() {
        if let Err(e) = regex::Regex::new(pattern) {
            errors.push(invalid(
                &format!("{key}[{i}]"),
                format!("`{pattern}` is not a valid regular expression: {e}"),
            ));
        }
    }
}
