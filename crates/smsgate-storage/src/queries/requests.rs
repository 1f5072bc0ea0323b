// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request summaries, quota accounting and the all-or-nothing intake write.

use rusqlite::{params, OptionalExtension};
use smsgate_core::{SmsGateError, SmsMessage, SmsRequest};

use crate::database::Database;
use crate::models::{get_json, get_opt_json, get_ts, opt_ts, to_json, to_opt_json, ts};

/// Persist a request summary together with all of its jobs.
///
/// Runs in one transaction: either every row commits or none does.
pub async fn insert_request(
    db: &Database,
    request: &SmsRequest,
    messages: &[SmsMessage],
) -> Result<(), SmsGateError> {
    let request = request.clone();
    let messages = messages.to_vec();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO sms_requests (request_id, api_key_id, client_name, template_id,
                     total_created, total_skipped, total_accepted, day_bucket, status_counts,
                     metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    request.request_id,
                    request.api_key_id,
                    request.client_name,
                    request.template_id,
                    request.total_created,
                    request.total_skipped,
                    request.total_accepted,
                    request.day_bucket,
                    to_json(&request.status_counts)?,
                    to_opt_json(request.metadata.as_ref())?,
                    ts(&request.created_at),
                ],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO sms_messages (message_id, request_id, api_key_id, client_name,
                         template_id, recipient, text, variables, vars_hash, schedule_at, status,
                         priority, priority_weight, lease_until, agent_id, attempts, last_error,
                         metadata, created_at, updated_at, sent_at, delivered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                             ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                )?;
                for m in &messages {
                    stmt.execute(params![
                        m.message_id,
                        m.request_id,
                        m.api_key_id,
                        m.client_name,
                        m.template_id,
                        m.to,
                        m.text,
                        to_json(&m.variables)?,
                        m.vars_hash,
                        opt_ts(m.schedule_at.as_ref()),
                        m.status.as_str(),
                        m.priority.as_str(),
                        m.priority_weight,
                        opt_ts(m.lease_until.as_ref()),
                        m.agent_id,
                        m.attempts,
                        m.last_error,
                        to_opt_json(m.metadata.as_ref())?,
                        ts(&m.created_at),
                        ts(&m.updated_at),
                        opt_ts(m.sent_at.as_ref()),
                        opt_ts(m.delivered_at.as_ref()),
                    ])?;
                }
            }
            tx.commit()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a request summary by id.
pub async fn get_request(
    db: &Database,
    request_id: &str,
) -> Result<Option<SmsRequest>, SmsGateError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SmsRequest>, rusqlite::Error> {
            conn.query_row(
                "SELECT request_id, api_key_id, client_name, template_id, total_created,
                        total_skipped, total_accepted, day_bucket, status_counts, metadata,
                        created_at
                 FROM sms_requests WHERE request_id = ?1",
                params![request_id],
                |row| {
                    Ok(SmsRequest {
                        request_id: row.get(0)?,
                        api_key_id: row.get(1)?,
                        client_name: row.get(2)?,
                        template_id: row.get(3)?,
                        total_created: row.get(4)?,
                        total_skipped: row.get(5)?,
                        total_accepted: row.get(6)?,
                        day_bucket: row.get(7)?,
                        status_counts: get_json(row, 8)?,
                        metadata: get_opt_json(row, 9)?,
                        created_at: get_ts(row, 10)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Quota already consumed by a caller in one day bucket.
///
/// A plain read: two intake calls racing on the same caller may both see the
/// same total.
pub async fn daily_usage(
    db: &Database,
    api_key_id: &str,
    day_bucket: &str,
) -> Result<i64, SmsGateError> {
    let api_key_id = api_key_id.to_string();
    let day_bucket = day_bucket.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT COALESCE(SUM(total_accepted), 0) FROM sms_requests
                 WHERE api_key_id = ?1 AND day_bucket = ?2",
                params![api_key_id, day_bucket],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}
