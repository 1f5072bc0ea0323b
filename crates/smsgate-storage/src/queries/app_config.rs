// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime key/value settings that override file configuration.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use smsgate_core::SmsGateError;

use crate::database::Database;
use crate::models::ts;

pub async fn get_app_config(db: &Database, key: &str) -> Result<Option<String>, SmsGateError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            conn.query_row(
                "SELECT value FROM app_config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or overwrite a setting; `created_at` is kept on overwrite.
pub async fn set_app_config(
    db: &Database,
    key: &str,
    value: &str,
    updated_by: &str,
    at: DateTime<Utc>,
) -> Result<(), SmsGateError> {
    let key = key.to_string();
    let value = value.to_string();
    let updated_by = updated_by.to_string();
    let at = ts(&at);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO app_config (key, value, updated_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_by = excluded.updated_by,
                     updated_at = excluded.updated_at",
                params![key, value, updated_by, at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
