// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The lease protocol: atomic claim and guarded status updates.
//!
//! Both operations are a single SQL statement whose `WHERE` clause is the
//! whole eligibility predicate, so the check and the write cannot be split by
//! another caller.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use smsgate_core::{MessageStatus, SmsGateError, SmsMessage, StatusUpdate};

use crate::database::Database;
use crate::models::ts;
use crate::queries::messages::{map_message_row, MESSAGE_COLUMNS};

/// `'A', 'B'` list of status literals for an `IN (...)` clause.
fn sql_list(statuses: &[MessageStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Claim the best eligible job for `agent_id`.
///
/// Eligible: PENDING, unowned or owned by this agent, and due (`schedule_at`
/// unset or not after `now`); or ASSIGNED/SENDING, owned by this agent, with
/// an expired lease. Ordered by priority weight, then creation time.
pub async fn claim_next(
    db: &Database,
    agent_id: &str,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
) -> Result<Option<SmsMessage>, SmsGateError> {
    let agent_id = agent_id.to_string();
    let now = ts(&now);
    let lease_until = ts(&lease_until);
    let leased = sql_list(&MessageStatus::LEASED);
    db.connection()
        .call(move |conn| -> Result<Option<SmsMessage>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE sms_messages
                     SET status = 'ASSIGNED',
                         agent_id = ?1,
                         lease_until = ?3,
                         updated_at = ?2,
                         attempts = attempts + 1
                     WHERE message_id = (
                         SELECT message_id FROM sms_messages
                         WHERE (status = 'PENDING'
                                AND (agent_id IS NULL OR agent_id = ?1)
                                AND (schedule_at IS NULL OR schedule_at <= ?2))
                            OR (status IN ({leased})
                                AND agent_id = ?1
                                AND lease_until <= ?2)
                         ORDER BY priority_weight ASC, created_at ASC, message_id ASC
                         LIMIT 1
                     )
                     RETURNING {MESSAGE_COLUMNS}"
                ),
                params![agent_id, now, lease_until],
                map_message_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply one reported status change.
///
/// Lands only if the job is unowned or owned by the reporter and its current
/// status is a legal predecessor of the new one. Returns whether a row changed.
pub async fn apply_status_update(
    db: &Database,
    update: &StatusUpdate,
) -> Result<bool, SmsGateError> {
    let predecessors = update.status.legal_predecessors();
    if predecessors.is_empty() {
        return Ok(false);
    }
    let allowed = sql_list(&predecessors);

    let message_id = update.message_id.clone();
    let agent_id = update.agent_id.clone();
    let status = update.status.as_str();
    let clear_lease = update.status.releases_lease();
    let last_error = update.last_error.clone();
    let at = ts(&update.at);
    let sent_at = (update.status == MessageStatus::Sent).then(|| at.clone());
    let delivered_at = (update.status == MessageStatus::Delivered).then(|| at.clone());

    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                &format!(
                    "UPDATE sms_messages
                     SET status = ?3,
                         agent_id = ?2,
                         last_error = ?4,
                         updated_at = ?5,
                         lease_until = CASE WHEN ?6 THEN NULL ELSE lease_until END,
                         sent_at = COALESCE(?7, sent_at),
                         delivered_at = COALESCE(?8, delivered_at)
                     WHERE message_id = ?1
                       AND (agent_id IS NULL OR agent_id = ?2)
                       AND status IN ({allowed})"
                ),
                params![
                    message_id,
                    agent_id,
                    status,
                    last_error,
                    at,
                    clear_lease,
                    sent_at,
                    delivered_at
                ],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(changed == 1)
}
