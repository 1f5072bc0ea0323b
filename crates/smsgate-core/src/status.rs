// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job status state machine and priority tiers.
//!
//! The transition table is the single source of truth for which status
//! changes are legal. Storage encodes it in SQL through
//! [`MessageStatus::legal_predecessors`], so a report can only land when the
//! row is still in a state the table allows.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Lifecycle status of a single outbound message (a "job").
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Pending,
    Assigned,
    Sending,
    Sent,
    Delivered,
    Failed,
    Canceled,
}

impl MessageStatus {
    /// Every status, in declaration order.
    pub const ALL: [MessageStatus; 7] = [
        MessageStatus::Pending,
        MessageStatus::Assigned,
        MessageStatus::Sending,
        MessageStatus::Sent,
        MessageStatus::Delivered,
        MessageStatus::Failed,
        MessageStatus::Canceled,
    ];

    /// Statuses this status may legally move to.
    pub const fn successors(self) -> &'static [MessageStatus] {
        use MessageStatus::*;
        match self {
            Pending => &[Assigned, Sending, Sent, Failed],
            Assigned => &[Sending, Sent, Failed],
            Sending => &[Sent, Failed],
            Sent => &[Delivered],
            Delivered | Failed | Canceled => &[],
        }
    }

    /// Statuses from which `self` may legally be entered.
    pub fn legal_predecessors(self) -> Vec<MessageStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }

    /// Whether moving from `self` to `next` is in the transition table.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        self.successors().contains(&next)
    }

    /// A status with no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Entering this status releases the lease (`lease_until` is cleared).
    pub fn releases_lease(self) -> bool {
        matches!(
            self,
            MessageStatus::Sent | MessageStatus::Failed | MessageStatus::Delivered
        )
    }

    /// Statuses whose expired lease makes the job reclaimable.
    pub const LEASED: [MessageStatus; 2] = [MessageStatus::Assigned, MessageStatus::Sending];

    /// Wire/database representation (`"PENDING"`, `"SENT"`, ...).
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Priority tier of a job. Lower weight is served first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Numeric ordering key stored alongside the job.
    pub const fn weight(self) -> i64 {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    /// Parse a caller-supplied priority, falling back to `NORMAL` for
    /// empty or unrecognized values.
    pub fn resolve(value: Option<&str>) -> Priority {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Wire/database representation (`"HIGH"`, `"NORMAL"`, `"LOW"`).
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
