// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid host names, non-empty paths and positive limits.

use crate::diagnostic::ConfigError;
use crate::model::SmsGateConfig;

/// Longest accepted duplicate-detection window: one week.
pub const MAX_DEDUP_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// Longest accepted lease: one day.
pub const MAX_LEASE_SECONDS: i64 = 24 * 60 * 60;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &SmsGateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    let base_path = &config.server.base_path;
    if !base_path.is_empty() && (!base_path.starts_with('/') || base_path.ends_with('/')) {
        fail(format!(
            "server.base_path `{base_path}` must start with `/` and must not end with `/`"
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let prefix = &config.intake.default_country_prefix;
    let prefix_ok = prefix
        .strip_prefix('+')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()));
    if !prefix_ok {
        fail(format!(
            "intake.default_country_prefix `{prefix}` must be `+` followed by digits"
        ));
    }

    if config.intake.max_recipients_per_request == 0 {
        fail("intake.max_recipients_per_request must be at least 1".to_string());
    }

    if config.intake.max_text_length == 0 {
        fail("intake.max_text_length must be at least 1".to_string());
    }

    if !(0..=MAX_DEDUP_WINDOW_MINUTES).contains(&config.intake.dedup_window_minutes) {
        fail(format!(
            "intake.dedup_window_minutes must be between 0 and {MAX_DEDUP_WINDOW_MINUTES}, got {}",
            config.intake.dedup_window_minutes
        ));
    }

    if config.intake.default_rate_limit_per_day < 0 {
        fail(format!(
            "intake.default_rate_limit_per_day must be non-negative, got {}",
            config.intake.default_rate_limit_per_day
        ));
    }

    if !(1..=MAX_LEASE_SECONDS).contains(&config.lease.lease_seconds) {
        fail(format!(
            "lease.lease_seconds must be between 1 and {MAX_LEASE_SECONDS}, got {}",
            config.lease.lease_seconds
        ));
    }

    if config.lease.max_batch == 0 {
        fail("lease.max_batch must be at least 1".to_string());
    }

    if config.lease.default_batch == 0 || config.lease.default_batch > config.lease.max_batch {
        fail(format!(
            "lease.default_batch must be between 1 and lease.max_batch ({}), got {}",
            config.lease.max_batch, config.lease.default_batch
        ));
    }

    if config.agent.default_rate_limit_per_min <= 0 {
        fail(format!(
            "agent.default_rate_limit_per_min must be positive, got {}",
            config.agent.default_rate_limit_per_min
        ));
    }

    if let Some(secret) = &config.auth.jwt_secret
        && secret.trim().is_empty()
    {
        fail("auth.jwt_secret must not be empty when set".to_string());
    }

    if !matches!(
        config.logging.level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        fail(format!(
            "logging.level `{}` must be one of trace, debug, info, warn, error",
            config.logging.level
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
