// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use smsgate_config::model::{IntakeConfig, StorageConfig};
use smsgate_core::principal::{SCOPE_READ, SCOPE_SEND};
use smsgate_core::{AgentCaller, ApiKeyCaller, StorageAdapter, Template};
use smsgate_storage::SqliteStorage;
use tempfile::{TempDir, tempdir};

use crate::intake::{IntakeRequest, IntakeService};
use crate::template::extract_variables;

pub(crate) async fn setup_storage() -> (Arc<dyn StorageAdapter>, TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dispatch.db");
    let storage = SqliteStorage::new(StorageConfig {
        database_path: path.to_str().unwrap().to_string(),
        wal_mode: true,
    });
    storage.initialize().await.unwrap();
    (Arc::new(storage), dir)
}

pub(crate) async fn seed_template(
    storage: &Arc<dyn StorageAdapter>,
    id: &str,
    content: &str,
    approved: bool,
) {
    let now = Utc::now();
    storage
        .insert_template(&Template {
            id: id.into(),
            name: id.into(),
            content: content.into(),
            variables: extract_variables(content),
            approved,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
}

/// `n` PENDING jobs against template `t1` (content `OTP {CODE}`).
pub(crate) async fn seed_jobs(storage: &Arc<dyn StorageAdapter>, n: usize) {
    let recipients: Vec<_> = (0..n)
        .map(|i| json!({"to": format!("0908{i:06}"), "variables": {"CODE": i.to_string()}}))
        .collect();
    let request: IntakeRequest = serde_json::from_value(json!({
        "template_id": "t1",
        "messages": recipients,
    }))
    .unwrap();
    IntakeService::new(storage.clone(), &IntakeConfig::default())
        .submit(&api_caller("k1", 10_000), request)
        .await
        .unwrap();
}

pub(crate) fn api_caller(id: &str, rate_limit_per_day: i64) -> ApiKeyCaller {
    ApiKeyCaller {
        id: id.into(),
        client_name: "shop".into(),
        scopes: vec![SCOPE_SEND.into(), SCOPE_READ.into()],
        rate_limit_per_day,
    }
}

pub(crate) fn agent_caller(agent_id: &str) -> AgentCaller {
    AgentCaller {
        agent_id: agent_id.into(),
        device_id: format!("device-{agent_id}"),
        rate_limit_per_min: 10,
    }
}
