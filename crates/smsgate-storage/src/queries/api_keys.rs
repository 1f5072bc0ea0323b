// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key rows, looked up by the SHA-256 of the presented key.

use rusqlite::{params, OptionalExtension};
use smsgate_core::{ApiKeyRecord, SmsGateError};

use crate::database::Database;
use crate::models::{get_json, get_ts, to_json, ts};

pub async fn insert_api_key(db: &Database, key: &ApiKeyRecord) -> Result<(), SmsGateError> {
    let key = key.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO api_keys (id, client_name, key_hash, scopes, rate_limit_per_day,
                     active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    key.id,
                    key.client_name,
                    key.key_hash,
                    to_json(&key.scopes)?,
                    key.rate_limit_per_day,
                    key.active,
                    ts(&key.created_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Find a key by hash regardless of its active flag; callers decide.
pub async fn find_api_key_by_hash(
    db: &Database,
    key_hash: &str,
) -> Result<Option<ApiKeyRecord>, SmsGateError> {
    let key_hash = key_hash.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<ApiKeyRecord>, rusqlite::Error> {
            conn.query_row(
                "SELECT id, client_name, key_hash, scopes, rate_limit_per_day, active, created_at
                 FROM api_keys WHERE key_hash = ?1",
                params![key_hash],
                |row| {
                    Ok(ApiKeyRecord {
                        id: row.get(0)?,
                        client_name: row.get(1)?,
                        key_hash: row.get(2)?,
                        scopes: get_json(row, 3)?,
                        rate_limit_per_day: row.get(4)?,
                        active: row.get(5)?,
                        created_at: get_ts(row, 6)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;
    use chrono::Utc;

    #[tokio::test]
    async fn lookup_by_hash() {
        let (db, _dir) = setup_db().await;
        let key = ApiKeyRecord {
            id: "k1".into(),
            client_name: "shop".into(),
            key_hash: "abc123".into(),
            scopes: vec!["sms:send".into(), "sms:read".into()],
            rate_limit_per_day: 10,
            active: true,
            created_at: Utc::now(),
        };
        insert_api_key(&db, &key).await.unwrap();

        let found = find_api_key_by_hash(&db, "abc123").await.unwrap().unwrap();
        assert_eq!(found.id, "k1");
        assert_eq!(found.scopes, key.scopes);
        assert_eq!(found.rate_limit_per_day, 10);
        assert!(found.active);
        assert!(find_api_key_by_hash(&db, "zzz").await.unwrap().is_none());

        // Hashes are unique.
        let dup = ApiKeyRecord {
            id: "k2".into(),
            ..key
        };
        assert!(insert_api_key(&db, &dup).await.is_err());

        db.close().await.unwrap();
    }
}
