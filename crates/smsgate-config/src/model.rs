// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for smsgate.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level smsgate configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsGateConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Request intake limits and phone policy.
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Lease protocol settings.
    #[serde(default)]
    pub lease: LeaseConfig,

    /// Agent registration defaults.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Admin JWT verification.
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional path prefix the API is mounted under (e.g. `/sms`).
    #[serde(default)]
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: String::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("smsgate").join("smsgate.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("smsgate.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_true() -> bool {
    true
}

/// Request intake configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntakeConfig {
    /// Upper bound on recipients in one request.
    #[serde(default = "default_max_recipients")]
    pub max_recipients_per_request: usize,

    /// Upper bound on rendered text length, in characters.
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Lookback window for identical (recipient, text) pairs.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_minutes: i64,

    /// Prefix applied to local-format numbers, e.g. `+84`.
    #[serde(default = "default_country_prefix")]
    pub default_country_prefix: String,

    /// Reject numbers outside the home country prefix.
    #[serde(default = "default_true")]
    pub block_international: bool,

    /// Daily quota for API keys created without an explicit limit.
    #[serde(default = "default_rate_limit_per_day")]
    pub default_rate_limit_per_day: i64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_recipients_per_request: default_max_recipients(),
            max_text_length: default_max_text_length(),
            dedup_window_minutes: default_dedup_window(),
            default_country_prefix: default_country_prefix(),
            block_international: true,
            default_rate_limit_per_day: default_rate_limit_per_day(),
        }
    }
}

fn default_max_recipients() -> usize {
    5000
}

fn default_max_text_length() -> usize {
    1600
}

fn default_dedup_window() -> i64 {
    3
}

fn default_country_prefix() -> String {
    "+84".to_string()
}

fn default_rate_limit_per_day() -> i64 {
    20_000
}

/// Lease protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeaseConfig {
    /// How long a claimed job stays exclusively owned.
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: i64,

    /// Claim batch size when the agent does not ask for one.
    #[serde(default = "default_batch")]
    pub default_batch: usize,

    /// Hard cap on one claim batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            lease_seconds: default_lease_seconds(),
            default_batch: default_batch(),
            max_batch: default_max_batch(),
        }
    }
}

fn default_lease_seconds() -> i64 {
    300
}

fn default_batch() -> usize {
    50
}

fn default_max_batch() -> usize {
    200
}

/// Agent registration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Send rate advertised to agents registered without one.
    #[serde(default = "default_agent_rate")]
    pub default_rate_limit_per_min: i64,

    /// Shared secret required to register a new device. A value set at
    /// runtime with `smsgate registration-secret set` takes precedence.
    #[serde(default)]
    pub registration_secret: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_rate_limit_per_min: default_agent_rate(),
            registration_secret: None,
        }
    }
}

fn default_agent_rate() -> i64 {
    10
}

/// Admin JWT verification. Bearer JWTs are rejected when no secret is set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// HS256 signing secret.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub jwt_issuer: Option<String>,

    #[serde(default)]
    pub jwt_audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter level (trace, debug, info, warn, error). `RUST_LOG`
    /// overrides it.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `GET /metrics`.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
