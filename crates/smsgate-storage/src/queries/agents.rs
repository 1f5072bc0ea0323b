// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent rows: registration, token rotation, profile and heartbeat updates.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use smsgate_core::{AgentRecord, Heartbeat, SmsGateError};

use crate::database::Database;
use crate::models::{get_opt_json, get_opt_ts, get_ts, opt_ts, to_opt_json, ts};

const AGENT_COLUMNS: &str = "agent_id, device_id, label, capabilities, rate_limit_per_min, \
     token_hash, active, status, battery_level, app_version, created_at, updated_at, last_seen_at";

fn map_agent_row(row: &Row<'_>) -> rusqlite::Result<AgentRecord> {
    Ok(AgentRecord {
        agent_id: row.get(0)?,
        device_id: row.get(1)?,
        label: row.get(2)?,
        capabilities: get_opt_json(row, 3)?,
        rate_limit_per_min: row.get(4)?,
        token_hash: row.get(5)?,
        active: row.get(6)?,
        status: row.get(7)?,
        battery_level: row.get(8)?,
        app_version: row.get(9)?,
        created_at: get_ts(row, 10)?,
        updated_at: get_ts(row, 11)?,
        last_seen_at: get_opt_ts(row, 12)?,
    })
}

pub async fn insert_agent(db: &Database, agent: &AgentRecord) -> Result<(), SmsGateError> {
    let a = agent.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                &format!(
                    "INSERT INTO agents ({AGENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    a.agent_id,
                    a.device_id,
                    a.label,
                    to_opt_json(a.capabilities.as_ref())?,
                    a.rate_limit_per_min,
                    a.token_hash,
                    a.active,
                    a.status,
                    a.battery_level,
                    a.app_version,
                    ts(&a.created_at),
                    ts(&a.updated_at),
                    opt_ts(a.last_seen_at.as_ref()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

async fn find_one(
    db: &Database,
    filter: &'static str,
    value: &str,
) -> Result<Option<AgentRecord>, SmsGateError> {
    let value = value.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<AgentRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE {filter}"),
                params![value],
                map_agent_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_agent(db: &Database, agent_id: &str) -> Result<Option<AgentRecord>, SmsGateError> {
    find_one(db, "agent_id = ?1", agent_id).await
}

pub async fn find_agent_by_device(
    db: &Database,
    device_id: &str,
) -> Result<Option<AgentRecord>, SmsGateError> {
    find_one(db, "device_id = ?1", device_id).await
}

pub async fn find_active_agent_by_token_hash(
    db: &Database,
    token_hash: &str,
) -> Result<Option<AgentRecord>, SmsGateError> {
    find_one(db, "token_hash = ?1 AND active = 1", token_hash).await
}

/// Replace the stored token hash. The old token stops working immediately.
pub async fn rotate_agent_token(
    db: &Database,
    agent_id: &str,
    token_hash: &str,
    at: DateTime<Utc>,
) -> Result<(), SmsGateError> {
    let agent_id = agent_id.to_string();
    let token_hash = token_hash.to_string();
    let at = ts(&at);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE agents SET token_hash = ?2, updated_at = ?3, last_seen_at = ?3
                 WHERE agent_id = ?1",
                params![agent_id, token_hash, at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Overwrite label and capabilities where given, keep them otherwise.
pub async fn update_agent_profile(
    db: &Database,
    agent_id: &str,
    label: Option<String>,
    capabilities: Option<serde_json::Value>,
    at: DateTime<Utc>,
) -> Result<(), SmsGateError> {
    let agent_id = agent_id.to_string();
    let at = ts(&at);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE agents
                 SET label = COALESCE(?2, label),
                     capabilities = COALESCE(?3, capabilities),
                     updated_at = ?4,
                     last_seen_at = ?4
                 WHERE agent_id = ?1",
                params![agent_id, label, to_opt_json(capabilities.as_ref())?, at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn record_heartbeat(
    db: &Database,
    agent_id: &str,
    heartbeat: &Heartbeat,
    at: DateTime<Utc>,
) -> Result<(), SmsGateError> {
    let agent_id = agent_id.to_string();
    let hb = heartbeat.clone();
    let at = ts(&at);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE agents
                 SET status = ?2, battery_level = ?3, app_version = ?4,
                     last_seen_at = ?5, updated_at = ?5
                 WHERE agent_id = ?1",
                params![agent_id, hb.status, hb.battery_level, hb.app_version, at],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
