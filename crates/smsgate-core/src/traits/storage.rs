// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends (SQLite, etc.).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SmsGateError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AgentRecord, ApiKeyRecord, AuditEntry, Heartbeat, MessageQuery, SmsMessage, SmsRequest,
    StatusUpdate, Template,
};

/// Adapter for storage and persistence backends.
///
/// The job table is the only contended resource. Implementations must make
/// [`claim_next`](StorageAdapter::claim_next) and
/// [`apply_status_update`](StorageAdapter::apply_status_update) single atomic
/// conditional updates, and [`insert_request`](StorageAdapter::insert_request)
/// all-or-nothing.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), SmsGateError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), SmsGateError>;

    // --- Templates ---

    async fn insert_template(&self, template: &Template) -> Result<(), SmsGateError>;

    async fn get_template(&self, id: &str) -> Result<Option<Template>, SmsGateError>;

    /// Marks a template approved. Returns false if no such template exists.
    async fn approve_template(&self, id: &str, at: DateTime<Utc>) -> Result<bool, SmsGateError>;

    // --- API keys ---

    async fn insert_api_key(&self, key: &ApiKeyRecord) -> Result<(), SmsGateError>;

    async fn find_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, SmsGateError>;

    // --- Agents ---

    async fn insert_agent(&self, agent: &AgentRecord) -> Result<(), SmsGateError>;

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentRecord>, SmsGateError>;

    async fn find_agent_by_device(
        &self,
        device_id: &str,
    ) -> Result<Option<AgentRecord>, SmsGateError>;

    /// Looks up an active agent by the SHA-256 hex of its bearer token.
    async fn find_active_agent_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AgentRecord>, SmsGateError>;

    async fn rotate_agent_token(
        &self,
        agent_id: &str,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError>;

    /// Updates label/capabilities (when given) and bumps `last_seen_at`.
    async fn update_agent_profile(
        &self,
        agent_id: &str,
        label: Option<String>,
        capabilities: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError>;

    async fn record_heartbeat(
        &self,
        agent_id: &str,
        heartbeat: &Heartbeat,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError>;

    // --- Runtime configuration ---

    async fn get_app_config(&self, key: &str) -> Result<Option<String>, SmsGateError>;

    async fn set_app_config(
        &self,
        key: &str,
        value: &str,
        updated_by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError>;

    // --- Requests and jobs ---

    /// Sum of `total_accepted` over the caller's requests in `day_bucket`.
    async fn daily_usage(&self, api_key_id: &str, day_bucket: &str) -> Result<i64, SmsGateError>;

    /// Whether a job with exactly this recipient and text was created at or
    /// after `since`.
    async fn has_recent_duplicate(
        &self,
        to: &str,
        text: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SmsGateError>;

    /// Persists the request summary and all of its jobs atomically.
    async fn insert_request(
        &self,
        request: &SmsRequest,
        messages: &[SmsMessage],
    ) -> Result<(), SmsGateError>;

    async fn get_request(&self, request_id: &str) -> Result<Option<SmsRequest>, SmsGateError>;

    /// Live per-status job counts for one request.
    async fn status_counts(
        &self,
        request_id: &str,
    ) -> Result<BTreeMap<String, i64>, SmsGateError>;

    /// Per-status job counts across the whole table.
    async fn count_by_status(&self) -> Result<BTreeMap<String, i64>, SmsGateError>;

    async fn get_message(&self, message_id: &str) -> Result<Option<SmsMessage>, SmsGateError>;

    async fn list_messages(&self, query: &MessageQuery) -> Result<Vec<SmsMessage>, SmsGateError>;

    // --- Lease protocol ---

    /// Atomically claims the best eligible job for `agent_id`, marking it
    /// ASSIGNED until `lease_until`. `None` when nothing is claimable.
    async fn claim_next(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<SmsMessage>, SmsGateError>;

    /// Applies one reported status change if the job exists, is owned by the
    /// reporter (or unowned) and the transition is legal. Returns whether a
    /// row changed.
    async fn apply_status_update(&self, update: &StatusUpdate) -> Result<bool, SmsGateError>;

    // --- Audit ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), SmsGateError>;

    /// Newest audit entries first.
    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>, SmsGateError>;
}
