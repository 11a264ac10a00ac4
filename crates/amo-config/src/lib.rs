// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Adaptive Model Optimizer.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, environment variable overrides, and diagnostic
//! error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use amo_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("cap window: {}", config.guard.cap_window);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, ConfigSource, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    AmoConfig, ClassifierConfig, FallbackConfig, GuardConfig, LogConfig, ModerationConfig,
    SinkKind, TelemetryConfig,
};

use std::path::Path;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Figment errors become miette diagnostics with typo suggestions. Validation
/// errors are pointed at the file that set the offending key.
pub fn load_and_validate() -> Result<AmoConfig, Vec<ConfigError>> {
    let loaded = loader::load_config();
    finish(loaded, collect_toml_sources)
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<AmoConfig, Vec<ConfigError>> {
    let loaded = loader::load_config_from_path(path);
    let config = finish(loaded, || {
        std::fs::read_to_string(path)
            .map(|content| vec![ConfigSource::new(path.display().to_string(), content)])
            .unwrap_or_default()
    })?;
    tracing::debug!(path = %path.display(), "configuration file accepted");
    Ok(config)
}

/// Load configuration from a specific TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<AmoConfig, Vec<ConfigError>> {
    let loaded = loader::load_config_from_str(toml_content);
    finish(loaded, || vec![ConfigSource::inline(toml_content)])
}

/// Validate a load result, reading sources only when there is something to report.
fn finish(
    loaded: Result<AmoConfig, figment::Error>,
    sources: impl Fn() -> Vec<ConfigSource>,
) -> Result<AmoConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| diagnostic::from_figment(err, &sources()))?;
    if let Err(mut errors) = validation::validate_config(&config) {
        diagnostic::attach_spans(&mut errors, &sources());
        return Err(errors);
    }
    tracing::debug!("configuration loaded and validated");
    Ok(config)
}

/// TOML files of the XDG hierarchy that exist, highest precedence first.
fn collect_toml_sources() -> Vec<ConfigSource> {
    let mut sources = Vec::new();

    if let Ok(content) = std::fs::read_to_string(loader::LOCAL_CONFIG_PATH) {
        let path = std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_CONFIG_PATH).display().to_string())
            .unwrap_or_else(|_| loader::LOCAL_CONFIG_PATH.to_string());
        sources.push(ConfigSource::new(path, content));
    }

    if let Some(path) = loader::user_config_path()
        && let Ok(content) = std::fs::read_to_string(&path)
    {
        sources.push(ConfigSource::new(path.display().to_string(), content));
    }

    let system_path = Path::new(loader::SYSTEM_CONFIG_PATH);
    if let Ok(content) = std::fs::read_to_string(system_path) {
        sources.push(ConfigSource::new(system_path.display().to_string(), content));
    }

    sources
}
