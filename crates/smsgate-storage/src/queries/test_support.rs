// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures shared by the query module tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use smsgate_core::types::day_bucket;
use smsgate_core::{MessageStatus, Priority, SmsMessage, SmsRequest};
use tempfile::{TempDir, tempdir};

use crate::database::Database;

pub(crate) async fn setup_db() -> (Database, TempDir) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
    (db, dir)
}

pub(crate) fn request(request_id: &str, api_key_id: &str, created_at: DateTime<Utc>) -> SmsRequest {
    SmsRequest {
        request_id: request_id.to_string(),
        api_key_id: api_key_id.to_string(),
        client_name: "shop".to_string(),
        template_id: "t1".to_string(),
        total_created: 0,
        total_skipped: 0,
        total_accepted: 0,
        day_bucket: day_bucket(&created_at),
        status_counts: BTreeMap::new(),
        metadata: None,
        created_at,
    }
}

pub(crate) fn message(
    message_id: &str,
    request_id: &str,
    to: &str,
    created_at: DateTime<Utc>,
) -> SmsMessage {
    let mut variables = serde_json::Map::new();
    variables.insert("CODE".into(), serde_json::Value::String("111".into()));
    SmsMessage {
        message_id: message_id.to_string(),
        request_id: request_id.to_string(),
        api_key_id: "k1".to_string(),
        client_name: "shop".to_string(),
        template_id: "t1".to_string(),
        to: to.to_string(),
        text: "OTP 111".to_string(),
        variables,
        vars_hash: "hash".to_string(),
        schedule_at: None,
        status: MessageStatus::Pending,
        priority: Priority::Normal,
        priority_weight: Priority::Normal.weight(),
        lease_until: None,
        agent_id: None,
        attempts: 0,
        last_error: None,
        metadata: None,
        created_at,
        updated_at: created_at,
        sent_at: None,
        delivered_at: None,
    }
}
