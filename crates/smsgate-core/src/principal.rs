// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authenticated caller of a request.
//!
//! Every authentication mechanism (API key header, agent bearer token, admin
//! JWT) resolves to one [`Principal`]. Handlers match on it instead of probing
//! which mechanism ran.

use serde::{Deserialize, Serialize};

use crate::types::ActorType;

/// Scope allowing request submission.
pub const SCOPE_SEND: &str = "sms:send";
/// Scope allowing request and message reads.
pub const SCOPE_READ: &str = "sms:read";

/// Raw credential extracted from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthToken {
    /// Value of the `X-API-Key` header.
    ApiKey(String),
    /// Token from `Authorization: Bearer <token>`.
    Bearer(String),
}

/// A client system submitting send requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyCaller {
    pub id: String,
    pub client_name: String,
    pub scopes: Vec<String>,
    pub rate_limit_per_day: i64,
}

/// A registered sending device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCaller {
    pub agent_id: String,
    pub device_id: String,
    pub rate_limit_per_min: i64,
}

/// An operator authenticated with a signed JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    ApiKey(ApiKeyCaller),
    Agent(AgentCaller),
    Admin(AdminUser),
}

impl Principal {
    /// Scopes granted to an API key. Agents and admins carry none; their
    /// access is decided by kind.
    pub fn scopes(&self) -> &[String] {
        match self {
            Principal::ApiKey(caller) => &caller.scopes,
            Principal::Agent(_) | Principal::Admin(_) => &[],
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().iter().any(|s| s == scope)
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Principal::Agent(_))
    }

    /// Request submission: API keys with `sms:send` only.
    pub fn can_send(&self) -> bool {
        matches!(self, Principal::ApiKey(_)) && self.has_scope(SCOPE_SEND)
    }

    /// Request and message reads: admins, or API keys with `sms:read`.
    pub fn can_read(&self) -> bool {
        match self {
            Principal::Admin(_) => true,
            Principal::ApiKey(_) => self.has_scope(SCOPE_READ),
            Principal::Agent(_) => false,
        }
    }

    pub fn as_agent(&self) -> Option<&AgentCaller> {
        match self {
            Principal::Agent(agent) => Some(agent),
            _ => None,
        }
    }

    pub fn as_api_key(&self) -> Option<&ApiKeyCaller> {
        match self {
            Principal::ApiKey(caller) => Some(caller),
            _ => None,
        }
    }

    pub fn actor_type(&self) -> ActorType {
        match self {
            Principal::ApiKey(_) => ActorType::ApiKey,
            Principal::Agent(_) => ActorType::Agent,
            Principal::Admin(_) => ActorType::User,
        }
    }

    pub fn actor_id(&self) -> &str {
        match self {
            Principal::ApiKey(caller) => &caller.id,
            Principal::Agent(agent) => &agent.agent_id,
            Principal::Admin(user) => &user.user_id,
        }
    }
}
