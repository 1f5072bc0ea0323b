// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template rows. Written by operator commands, read by intake.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use smsgate_core::{SmsGateError, Template};

use crate::database::Database;
use crate::models::{get_json, get_ts, to_json, ts};

pub async fn insert_template(db: &Database, template: &Template) -> Result<(), SmsGateError> {
    let t = template.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO templates (id, name, content, variables, approved, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    t.id,
                    t.name,
                    t.content,
                    to_json(&t.variables)?,
                    t.approved,
                    ts(&t.created_at),
                    ts(&t.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_template(db: &Database, id: &str) -> Result<Option<Template>, SmsGateError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Template>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, name, content, variables, approved, created_at, updated_at
                 FROM templates WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Template {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        content: row.get(2)?,
                        variables: get_json(row, 3)?,
                        approved: row.get(4)?,
                        created_at: get_ts(row, 5)?,
                        updated_at: get_ts(row, 6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a template approved. Returns false when the id is unknown.
pub async fn approve_template(
    db: &Database,
    id: &str,
    at: DateTime<Utc>,
) -> Result<bool, SmsGateError> {
    let id = id.to_string();
    let at = ts(&at);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE templates SET approved = 1, updated_at = ?2 WHERE id = ?1",
                params![id, at],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(changed > 0)
}
