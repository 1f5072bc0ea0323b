// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lease manager: hands jobs to agents under a time-bounded exclusive lease.
//!
//! Each claim is one atomic conditional update in storage; a batch is that
//! claim repeated until the limit is reached or nothing is left. Two agents
//! polling at the same time can never both receive the same job.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use smsgate_config::model::LeaseConfig;
use smsgate_core::{
    ActorType, AgentCaller, AuditAction, AuditEntry, SmsGateError, SmsMessage, StorageAdapter,
};
use tracing::info;

use crate::metrics;

/// A claimed batch, as returned by `GET /agent/jobs/next`.
#[derive(Debug, Clone)]
pub struct LeaseBatch {
    pub batch_id: String,
    pub lease_seconds: i64,
    pub rate_limit_per_min: i64,
    pub messages: Vec<SmsMessage>,
}

/// The subset of a job an agent needs in order to send it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeasedJob {
    pub message_id: String,
    pub request_id: String,
    pub to: String,
    pub text: String,
    pub priority: String,
    pub schedule_at: Option<String>,
}

impl From<&SmsMessage> for LeasedJob {
    fn from(m: &SmsMessage) -> Self {
        Self {
            message_id: m.message_id.clone(),
            request_id: m.request_id.clone(),
            to: m.to.clone(),
            text: m.text.clone(),
            priority: m.priority.as_str().to_string(),
            schedule_at: m.schedule_at.as_ref().map(smsgate_core::types::format_timestamp),
        }
    }
}

pub struct LeaseManager {
    storage: Arc<dyn StorageAdapter>,
    lease_seconds: i64,
    default_batch: usize,
    max_batch: usize,
}

impl LeaseManager {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: &LeaseConfig) -> Self {
        Self {
            storage,
            lease_seconds: config.lease_seconds,
            default_batch: config.default_batch,
            max_batch: config.max_batch,
        }
    }

    /// Requested batch size, defaulted and capped.
    pub fn batch_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_batch).min(self.max_batch)
    }

    pub async fn claim_batch(
        &self,
        agent: &AgentCaller,
        limit: usize,
    ) -> Result<LeaseBatch, SmsGateError> {
        self.claim_batch_at(agent, limit, Utc::now()).await
    }

    /// Claim up to `limit` jobs for `agent` as of `now`.
    ///
    /// Fewer than `limit` results just means the eligible pool ran dry.
    pub async fn claim_batch_at(
        &self,
        agent: &AgentCaller,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<LeaseBatch, SmsGateError> {
        let lease_until = now + Duration::seconds(self.lease_seconds);
        let mut messages = Vec::new();
        while messages.len() < limit {
            match self
                .storage
                .claim_next(&agent.agent_id, now, lease_until)
                .await?
            {
                Some(job) => messages.push(job),
                None => break,
            }
        }

        if !messages.is_empty() {
            self.storage
                .append_audit(&AuditEntry::new(
                    ActorType::Agent,
                    agent.agent_id.clone(),
                    AuditAction::AgentLeaseBatch,
                    serde_json::json!({"count": messages.len(), "agent_id": agent.agent_id}),
                ))
                .await?;
            metrics::record_claimed(&agent.agent_id, messages.len() as u64);
            info!(agent_id = %agent.agent_id, count = messages.len(), "lease batch claimed");
        }

        Ok(LeaseBatch {
            batch_id: uuid::Uuid::new_v4().to_string(),
            lease_seconds: self.lease_seconds,
            rate_limit_per_min: agent.rate_limit_per_min,
            messages,
        })
    }
}
