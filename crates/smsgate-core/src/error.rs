// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the smsgate dispatch queue.

use thiserror::Error;

/// The primary error type used across all smsgate adapter traits and core operations.
///
/// Expected outcomes of concurrent operation (a claim predicate that no longer
/// holds, a report against a job owned by another agent) are not errors and
/// never surface as a variant here.
#[derive(Debug, Error)]
pub enum SmsGateError {
    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Caller input rejected before anything was persisted.
    #[error("{0}")]
    Validation(String),

    /// The referenced template does not exist or has not been approved.
    #[error("template {template_id} is not approved")]
    TemplateNotApproved { template_id: String },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The caller's daily quota would be exceeded by this batch.
    #[error("daily rate limit exceeded: {usage} used + {requested} requested > {limit}")]
    RateLimited {
        usage: i64,
        requested: i64,
        limit: i64,
    },

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SmsGateError {
    /// Shorthand for a [`SmsGateError::Storage`] built from any error value.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SmsGateError::Storage {
            source: Box::new(err),
        }
    }

    /// True for errors caused by caller input (the 4xx family).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SmsGateError::Validation(_)
                | SmsGateError::TemplateNotApproved { .. }
                | SmsGateError::NotFound { .. }
                | SmsGateError::RateLimited { .. }
                | SmsGateError::Unauthorized(_)
                | SmsGateError::Forbidden(_)
        )
    }
}
