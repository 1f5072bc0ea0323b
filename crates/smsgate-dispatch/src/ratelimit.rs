// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily caller quota and the recent-duplicate window.
//!
//! Usage is a plain read of already-committed request summaries. Two intake
//! calls from the same caller racing within one day bucket can both pass the
//! check; the quota is best-effort, not linearizable.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use smsgate_core::types::day_bucket;
use smsgate_core::{SmsGateError, StorageAdapter};

pub struct RateLimiter {
    storage: Arc<dyn StorageAdapter>,
    dedup_window: Duration,
}

impl RateLimiter {
    pub fn new(storage: Arc<dyn StorageAdapter>, dedup_window_minutes: i64) -> Self {
        Self {
            storage,
            dedup_window: Duration::minutes(dedup_window_minutes),
        }
    }

    /// Quota the caller has consumed in `now`'s day bucket.
    pub async fn usage(&self, api_key_id: &str, now: DateTime<Utc>) -> Result<i64, SmsGateError> {
        self.storage.daily_usage(api_key_id, &day_bucket(&now)).await
    }

    /// Whether the same recipient already got the same text inside the window.
    pub async fn is_recent_duplicate(
        &self,
        to: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, SmsGateError> {
        self.storage
            .has_recent_duplicate(to, text, now - self.dedup_window)
            .await
    }
}

/// Reject when `usage + requested` would go over `limit`.
pub fn check_quota(usage: i64, requested: i64, limit: i64) -> Result<(), SmsGateError> {
    if usage + requested > limit {
        return Err(SmsGateError::RateLimited {
            usage,
            requested,
            limit,
        });
    }
    Ok(())
}
