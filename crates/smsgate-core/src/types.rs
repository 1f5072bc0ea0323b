// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared by storage, dispatch and the HTTP gateway.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::SmsGateError;
use crate::status::{MessageStatus, Priority};

/// `last_error` recorded on jobs cancelled by the dedup window.
pub const DUPLICATE_RECENT: &str = "DUPLICATE_RECENT";

/// `app_config` key holding the operator-set agent registration secret.
pub const REGISTRATION_SECRET_KEY: &str = "agent_registration_secret";

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Auth,
}

// --- Timestamps ---

/// Render a timestamp in the fixed-width form used for storage.
///
/// Always millisecond precision with a `Z` suffix, so two stored values
/// compare lexicographically in the same order as chronologically.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp. A value without an offset is taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, SmsGateError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(SmsGateError::Validation(format!("invalid timestamp: {value}")))
}

/// Calendar day (UTC) used as the quota accounting bucket.
pub fn day_bucket(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

// --- Templates ---

/// A named, variable-parameterized message template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Text with `{VAR}` placeholders.
    pub content: String,
    /// Sorted, de-duplicated placeholder names found in `content`.
    pub variables: Vec<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Callers and agents ---

/// Stored API key. Only the SHA-256 hex of the plaintext key is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub client_name: String,
    pub key_hash: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_day: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A registered sending device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    pub device_id: String,
    pub label: Option<String>,
    /// Free-form capability descriptor supplied by the device.
    pub capabilities: Option<serde_json::Value>,
    pub rate_limit_per_min: i64,
    pub token_hash: String,
    pub active: bool,
    pub status: Option<String>,
    pub battery_level: Option<f64>,
    pub app_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Liveness report sent by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: String,
    pub battery_level: Option<f64>,
    pub app_version: Option<String>,
}

// --- Requests and jobs ---

/// Summary row written once per accepted intake call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsRequest {
    pub request_id: String,
    pub api_key_id: String,
    pub client_name: String,
    pub template_id: String,
    pub total_created: i64,
    pub total_skipped: i64,
    /// Quota consumed by this request; summed per day bucket.
    pub total_accepted: i64,
    pub day_bucket: String,
    /// Status counts as of creation.
    pub status_counts: BTreeMap<String, i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// One outbound message: the unit handed to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub message_id: String,
    pub request_id: String,
    pub api_key_id: String,
    pub client_name: String,
    pub template_id: String,
    pub to: String,
    pub text: String,
    pub variables: serde_json::Map<String, serde_json::Value>,
    pub vars_hash: String,
    pub schedule_at: Option<DateTime<Utc>>,
    pub status: MessageStatus,
    pub priority: Priority,
    pub priority_weight: i64,
    pub lease_until: Option<DateTime<Utc>>,
    pub agent_id: Option<String>,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Filter for paged message listings.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageQuery {
    pub request_id: String,
    /// Exact status string; an unknown value simply matches nothing.
    pub status: Option<String>,
    /// Restrict to one caller's messages.
    pub api_key_id: Option<String>,
    pub limit: i64,
    pub skip: i64,
}

/// A single status change proposed by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub message_id: String,
    pub agent_id: String,
    pub status: MessageStatus,
    pub last_error: Option<String>,
    pub at: DateTime<Utc>,
}

// --- Audit ---

/// Who performed an audited action.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    ApiKey,
    Agent,
    User,
    System,
}

/// Audited action names.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateSmsRequest,
    AgentLeaseBatch,
    AgentReportResults,
    AgentRegistered,
    AgentTokenRotated,
    CreateApiKey,
    CreateTemplate,
    ApproveTemplate,
    SetRegistrationSecret,
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor_type: ActorType,
    pub actor_id: String,
    pub action: AuditAction,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_type: ActorType,
        actor_id: impl Into<String>,
        action: AuditAction,
        data: serde_json::Value,
    ) -> Self {
        Self {
            actor_type,
            actor_id: actor_id.into(),
            action,
            data,
            created_at: Utc::now(),
        }
    }
}
