// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit trail.

use rusqlite::params;
use smsgate_core::{AuditEntry, SmsGateError};

use crate::database::Database;
use crate::models::{to_json, ts};

pub async fn append_audit(db: &Database, entry: &AuditEntry) -> Result<(), SmsGateError> {
    let actor_type = entry.actor_type.to_string();
    let actor_id = entry.actor_id.clone();
    let action = entry.action.to_string();
    let data = entry.data.clone();
    let created_at = ts(&entry.created_at);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO audit_log (actor_type, actor_id, action, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![actor_type, actor_id, action, to_json(&data)?, created_at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent entries first. Used by tests and the status command.
pub async fn recent_audit(db: &Database, limit: i64) -> Result<Vec<AuditEntry>, SmsGateError> {
    db.connection()
        .call(move |conn| -> Result<Vec<AuditEntry>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT actor_type, actor_id, action, data, created_at
                 FROM audit_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(AuditEntry {
                    actor_type: crate::models::get_enum(row, 0)?,
                    actor_id: row.get(1)?,
                    action: crate::models::get_enum(row, 2)?,
                    data: crate::models::get_json(row, 3)?,
                    created_at: crate::models::get_ts(row, 4)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
