// SPDX-FileCopyrightText: 2026 AMO Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./amo.toml` > `~/.config/amo/amo.toml` > `/etc/amo/amo.toml`
//! with environment variable overrides via `AMO_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::AmoConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/amo/amo.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "amo.toml";

/// Path of the per-user config file, if the platform has a config directory.
pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("amo/amo.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/amo/amo.toml` (system-wide)
/// 3. `~/.config/amo/amo.toml` (user XDG config)
/// 4. `./amo.toml` (local directory)
/// 5. `AMO_*` environment variables
pub fn load_config() -> Result<AmoConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<AmoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmoConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AmoConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AmoConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(AmoConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `AMO_GUARD_CAP_WINDOW` must map to `guard.cap_window`, not
/// `guard.cap.window`.
fn env_provider() -> Env {
    Env::prefixed("AMO_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name onto a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 6] = [
        "log",
        "classifier",
        "guard",
        "fallback",
        "telemetry",
        "moderation",
    ];

    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("guard_cap_window"), "guard.cap_window");
        assert_eq!(
            map_env_key("telemetry_queue_capacity"),
            "telemetry.queue_capacity"
        );
        assert_eq!(map_env_key("log_level"), "log.level");
        assert_eq!(
            map_env_key("fallback_primary_timeout_ms"),
            "fallback.primary_timeout_ms"
        );
    }

    #[test]
    fn unknown_env_section_is_left_alone() {
        assert_eq!(map_env_key("unrelated_thing"), "unrelated_thing");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amo.toml");
        std::fs::write(&path, "[guard]\ncap_window = 5\nhistory_len = 10\n").unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.guard.cap_window, 5);
        assert_eq!(config.guard.history_len, 10);
        assert_eq!(config.classifier.long_prompt_chars, 2000);
    }
}
