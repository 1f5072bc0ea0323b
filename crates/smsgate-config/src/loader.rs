// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./smsgate.toml` > `~/.config/smsgate/smsgate.toml` > `/etc/smsgate/smsgate.toml`
//! with environment variable overrides via `SMSGATE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SmsGateConfig;

/// Config sections, used to turn `SMSGATE_<SECTION>_<KEY>` into `section.key`.
const SECTIONS: [&str; 8] = [
    "server", "storage", "intake", "lease", "agent", "auth", "logging", "metrics",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/smsgate/smsgate.toml` (system-wide)
/// 3. `~/.config/smsgate/smsgate.toml` (user XDG config)
/// 4. `./smsgate.toml` (local directory)
/// 5. `SMSGATE_*` environment variables
pub fn load_config() -> Result<SmsGateConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SmsGateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SmsGateConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SmsGateConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SmsGateConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SmsGateConfig::default()))
        .merge(Toml::file("/etc/smsgate/smsgate.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("smsgate/smsgate.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("smsgate.toml"))
        .merge(env_provider())
}

/// Environment provider mapping only the leading section name to a dot.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `SMSGATE_INTAKE_DEDUP_WINDOW_MINUTES` must become
/// `intake.dedup_window_minutes`, not `intake.dedup.window.minutes`.
fn env_provider() -> Env {
    Env::prefixed("SMSGATE_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to its dotted config path.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
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
    fn env_keys_split_on_section_only() {
        assert_eq!(
            map_env_key("intake_dedup_window_minutes"),
            "intake.dedup_window_minutes"
        );
        assert_eq!(map_env_key("lease_lease_seconds"), "lease.lease_seconds");
        assert_eq!(map_env_key("auth_jwt_secret"), "auth.jwt_secret");
        assert_eq!(map_env_key("server_port"), "server.port");
    }

    #[test]
    fn unknown_sections_pass_through() {
        assert_eq!(map_env_key("whatever_key"), "whatever_key");
        assert_eq!(map_env_key("serverport"), "serverport");
    }
}
