// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Adaptive Model Optimizer.

use thiserror::Error;

/// The primary error type used across AMO components and collaborator traits.
#[derive(Debug, Error)]
pub enum AmoError {
    /// Configuration errors (invalid values, patterns that fail to compile).
    #[error("configuration error: {0}")]
    Config(String),

    /// Model provider errors (invocation failure, broken token stream).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A provider attempt exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Telemetry storage errors (database open, insert failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Telemetry pipeline errors that are not storage related.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AmoError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        AmoError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error came from the provider side (including timeouts).
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, AmoError::Provider { .. } | AmoError::Timeout { .. })
    }
}
