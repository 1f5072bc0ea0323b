// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies agent-reported status changes.
//!
//! Entries that do not apply (unknown job, another agent's job, terminal job,
//! illegal transition, malformed entry) are skipped without error so replayed
//! and out-of-order reports are harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use smsgate_core::{
    ActorType, AgentCaller, AuditAction, AuditEntry, MessageStatus, SmsGateError, StatusUpdate,
    StorageAdapter,
};
use tracing::{debug, info};

use crate::metrics;

/// One entry of `POST /agent/messages/report`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportItem {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

pub struct ReportProcessor {
    storage: Arc<dyn StorageAdapter>,
}

impl ReportProcessor {
    pub fn new(storage: Arc<dyn StorageAdapter>) -> Self {
        Self { storage }
    }

    /// Apply a batch of results and return how many jobs changed.
    pub async fn apply(
        &self,
        agent: &AgentCaller,
        items: Vec<ReportItem>,
    ) -> Result<usize, SmsGateError> {
        self.apply_at(agent, items, Utc::now()).await
    }

    pub async fn apply_at(
        &self,
        agent: &AgentCaller,
        items: Vec<ReportItem>,
        now: DateTime<Utc>,
    ) -> Result<usize, SmsGateError> {
        if items.is_empty() {
            return Err(SmsGateError::Validation("messages required".into()));
        }

        let mut updated = 0usize;
        for item in items {
            let Some(message_id) = item.message_id.filter(|id| !id.is_empty()) else {
                continue;
            };
            let Some(status) = item.status.and_then(|s| s.parse::<MessageStatus>().ok()) else {
                debug!(message_id = %message_id, "report skipped: unknown status");
                continue;
            };
            let applied = self
                .storage
                .apply_status_update(&StatusUpdate {
                    message_id,
                    agent_id: agent.agent_id.clone(),
                    status,
                    last_error: item.last_error,
                    at: now,
                })
                .await?;
            if applied {
                updated += 1;
            }
        }

        self.storage
            .append_audit(&AuditEntry::new(
                ActorType::Agent,
                agent.agent_id.clone(),
                AuditAction::AgentReportResults,
                serde_json::json!({"updated": updated, "agent_id": agent.agent_id}),
            ))
            .await?;
        metrics::record_reports_applied(updated as u64);
        info!(agent_id = %agent.agent_id, updated, "agent report applied");
        Ok(updated)
    }
}
