// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job (sms_messages) reads: lookup, paged listing, dedup probe, counts.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use smsgate_core::{MessageQuery, SmsGateError, SmsMessage};

use crate::database::Database;
use crate::models::{get_enum, get_json, get_opt_json, get_opt_ts, get_ts, ts};

/// Column list matching [`map_message_row`].
pub(crate) const MESSAGE_COLUMNS: &str = "message_id, request_id, api_key_id, client_name, \
     template_id, recipient, text, variables, vars_hash, schedule_at, status, priority, \
     priority_weight, lease_until, agent_id, attempts, last_error, metadata, created_at, \
     updated_at, sent_at, delivered_at";

pub(crate) fn map_message_row(row: &Row<'_>) -> rusqlite::Result<SmsMessage> {
    Ok(SmsMessage {
        message_id: row.get(0)?,
        request_id: row.get(1)?,
        api_key_id: row.get(2)?,
        client_name: row.get(3)?,
        template_id: row.get(4)?,
        to: row.get(5)?,
        text: row.get(6)?,
        variables: get_json(row, 7)?,
        vars_hash: row.get(8)?,
        schedule_at: get_opt_ts(row, 9)?,
        status: get_enum(row, 10)?,
        priority: get_enum(row, 11)?,
        priority_weight: row.get(12)?,
        lease_until: get_opt_ts(row, 13)?,
        agent_id: row.get(14)?,
        attempts: row.get(15)?,
        last_error: row.get(16)?,
        metadata: get_opt_json(row, 17)?,
        created_at: get_ts(row, 18)?,
        updated_at: get_ts(row, 19)?,
        sent_at: get_opt_ts(row, 20)?,
        delivered_at: get_opt_ts(row, 21)?,
    })
}

/// Get one job by its message id.
pub async fn get_message(
    db: &Database,
    message_id: &str,
) -> Result<Option<SmsMessage>, SmsGateError> {
    let message_id = message_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<SmsMessage>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM sms_messages WHERE message_id = ?1"),
                params![message_id],
                map_message_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Page through one request's jobs in creation order.
pub async fn list_messages(
    db: &Database,
    query: &MessageQuery,
) -> Result<Vec<SmsMessage>, SmsGateError> {
    let query = query.clone();
    db.connection()
        .call(move |conn| -> Result<Vec<SmsMessage>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM sms_messages
                 WHERE request_id = ?1
                   AND (?2 IS NULL OR status = ?2)
                   AND (?3 IS NULL OR api_key_id = ?3)
                 ORDER BY created_at ASC, message_id ASC
                 LIMIT ?4 OFFSET ?5"
            ))?;
            let rows = stmt.query_map(
                params![
                    query.request_id,
                    query.status,
                    query.api_key_id,
                    query.limit,
                    query.skip
                ],
                map_message_row,
            )?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Whether a job with this exact recipient and text was created at or after `since`.
pub async fn has_recent_duplicate(
    db: &Database,
    to: &str,
    text: &str,
    since: DateTime<Utc>,
) -> Result<bool, SmsGateError> {
    let to = to.to_string();
    let text = text.to_string();
    let since = ts(&since);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM sms_messages
                     WHERE recipient = ?1 AND text = ?2 AND created_at >= ?3
                 )",
                params![to, text, since],
                |row| row.get(0),
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Live job counts per status for one request.
pub async fn status_counts(
    db: &Database,
    request_id: &str,
) -> Result<BTreeMap<String, i64>, SmsGateError> {
    let request_id = request_id.to_string();
    db.connection()
        .call(move |conn| -> Result<BTreeMap<String, i64>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM sms_messages
                 WHERE request_id = ?1 GROUP BY status",
            )?;
            let rows = stmt.query_map(params![request_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Job counts per status across the whole table.
pub async fn count_by_status(db: &Database) -> Result<BTreeMap<String, i64>, SmsGateError> {
    db.connection()
        .call(|conn| -> Result<BTreeMap<String, i64>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM sms_messages GROUP BY status")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
