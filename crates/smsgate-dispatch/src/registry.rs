// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent registration, token rotation and heartbeats.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smsgate_config::model::AgentConfig;
use smsgate_core::types::REGISTRATION_SECRET_KEY;
use smsgate_core::{
    ActorType, AgentCaller, AgentRecord, AuditAction, AuditEntry, Heartbeat, SmsGateError,
    StorageAdapter,
};
use tracing::info;

use crate::token::{AGENT_TOKEN_BYTES, generate_token, sha256_hex};

/// Body of `POST /agent/register`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capabilities: Option<Value>,
    #[serde(default)]
    pub registration_secret: Option<String>,
    /// Absent means rotate. `false`, `0`, `"0"`, `"false"`, `"False"` mean keep.
    #[serde(default)]
    pub rotate_token: Option<Value>,
    #[serde(default)]
    pub rate_limit_per_min: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterStatus {
    Ok,
    Rotated,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterOutcome {
    pub status: RegisterStatus,
    pub agent_id: String,
    /// Plaintext token; only present when one was just issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_token: Option<String>,
    /// A new agent row was inserted.
    #[serde(skip)]
    pub created: bool,
}

/// Body of `POST /agent/heartbeat`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub app_version: Option<String>,
}

pub struct AgentRegistry {
    storage: Arc<dyn StorageAdapter>,
    default_rate_limit_per_min: i64,
    configured_secret: Option<String>,
}

impl AgentRegistry {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: &AgentConfig) -> Self {
        Self {
            storage,
            default_rate_limit_per_min: config.default_rate_limit_per_min,
            configured_secret: config.registration_secret.clone(),
        }
    }

    /// The secret new devices must present; the runtime value wins over the
    /// configured one. Empty means registration is open.
    pub async fn registration_secret(&self) -> Result<String, SmsGateError> {
        if let Some(secret) = self.storage.get_app_config(REGISTRATION_SECRET_KEY).await? {
            return Ok(secret);
        }
        Ok(self.configured_secret.clone().unwrap_or_default())
    }

    pub async fn set_registration_secret(
        &self,
        secret: &str,
        updated_by: &str,
    ) -> Result<(), SmsGateError> {
        self.storage
            .set_app_config(REGISTRATION_SECRET_KEY, secret, updated_by, Utc::now())
            .await?;
        self.storage
            .append_audit(&AuditEntry::new(
                ActorType::System,
                updated_by,
                AuditAction::SetRegistrationSecret,
                serde_json::json!({"updated_by": updated_by}),
            ))
            .await
    }

    /// Register a device, refresh an authenticated agent's profile, or
    /// rotate an existing device's token.
    pub async fn register(
        &self,
        current: Option<&AgentCaller>,
        request: RegisterRequest,
    ) -> Result<RegisterOutcome, SmsGateError> {
        let Some(device_id) = request.device_id.filter(|d| !d.is_empty()) else {
            return Err(SmsGateError::Validation("device_id required".into()));
        };
        let now = Utc::now();

        if let Some(agent) = current {
            self.storage
                .update_agent_profile(
                    &agent.agent_id,
                    request.label.filter(|l| !l.is_empty()),
                    request.capabilities.filter(|c| !c.is_null()),
                    now,
                )
                .await?;
            return Ok(RegisterOutcome {
                status: RegisterStatus::Ok,
                agent_id: agent.agent_id.clone(),
                agent_token: None,
                created: false,
            });
        }

        let secret = self.registration_secret().await?;
        if !secret.is_empty() && request.registration_secret.as_deref() != Some(secret.as_str()) {
            return Err(SmsGateError::Forbidden("registration_secret invalid".into()));
        }

        if let Some(existing) = self.storage.find_agent_by_device(&device_id).await? {
            if !wants_rotation(request.rotate_token.as_ref()) {
                return Ok(RegisterOutcome {
                    status: RegisterStatus::Exists,
                    agent_id: existing.agent_id,
                    agent_token: None,
                    created: false,
                });
            }
            let token = generate_token(AGENT_TOKEN_BYTES);
            self.storage
                .rotate_agent_token(&existing.agent_id, &sha256_hex(&token), now)
                .await?;
            self.storage
                .append_audit(&AuditEntry::new(
                    ActorType::Agent,
                    existing.agent_id.clone(),
                    AuditAction::AgentTokenRotated,
                    serde_json::json!({"device_id": device_id}),
                ))
                .await?;
            info!(agent_id = %existing.agent_id, "agent token rotated");
            return Ok(RegisterOutcome {
                status: RegisterStatus::Rotated,
                agent_id: existing.agent_id,
                agent_token: Some(token),
                created: false,
            });
        }

        let rate_limit_per_min = match request.rate_limit_per_min.as_ref() {
            None | Some(Value::Null) => self.default_rate_limit_per_min,
            Some(v) => parse_int(v).ok_or_else(|| {
                SmsGateError::Validation("rate_limit_per_min must be an integer".into())
            })?,
        };
        // 0 behaves like "not given".
        let rate_limit_per_min = if rate_limit_per_min == 0 {
            self.default_rate_limit_per_min
        } else {
            rate_limit_per_min
        };

        let token = generate_token(AGENT_TOKEN_BYTES);
        let agent = AgentRecord {
            agent_id: uuid::Uuid::new_v4().to_string(),
            device_id: device_id.clone(),
            label: request.label,
            capabilities: request.capabilities,
            rate_limit_per_min,
            token_hash: sha256_hex(&token),
            active: true,
            status: None,
            battery_level: None,
            app_version: None,
            created_at: now,
            updated_at: now,
            last_seen_at: Some(now),
        };
        self.storage.insert_agent(&agent).await?;
        self.storage
            .append_audit(&AuditEntry::new(
                ActorType::Agent,
                agent.agent_id.clone(),
                AuditAction::AgentRegistered,
                serde_json::json!({"device_id": device_id}),
            ))
            .await?;
        info!(agent_id = %agent.agent_id, device_id = %device_id, "agent registered");

        Ok(RegisterOutcome {
            status: RegisterStatus::Ok,
            agent_id: agent.agent_id,
            agent_token: Some(token),
            created: true,
        })
    }

    pub async fn heartbeat(
        &self,
        agent: &AgentCaller,
        request: HeartbeatRequest,
    ) -> Result<(), SmsGateError> {
        let heartbeat = Heartbeat {
            status: request.status.unwrap_or_else(|| "online".to_string()),
            battery_level: request.battery_level,
            app_version: request.app_version,
        };
        self.storage
            .record_heartbeat(&agent.agent_id, &heartbeat, Utc::now())
            .await
    }
}

fn wants_rotation(flag: Option<&Value>) -> bool {
    match flag {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(Value::String(s)) => !matches!(s.as_str(), "0" | "false" | "False"),
        _ => true,
    }
}

fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_storage;
    use serde_json::json;

    fn registry(storage: Arc<dyn StorageAdapter>, secret: Option<&str>) -> AgentRegistry {
        AgentRegistry::new(
            storage,
            &AgentConfig {
                default_rate_limit_per_min: 10,
                registration_secret: secret.map(str::to_string),
            },
        )
    }

    fn req(v: Value) -> RegisterRequest {
        serde_json::from_value(v).unwrap()
    }

    fn caller_for(record: &AgentRecord) -> AgentCaller {
        AgentCaller {
            agent_id: record.agent_id.clone(),
            device_id: record.device_id.clone(),
            rate_limit_per_min: record.rate_limit_per_min,
        }
    }

    #[test]
    fn rotation_flag_falsy_values() {
        assert!(wants_rotation(None));
        assert!(wants_rotation(Some(&json!(true))));
        assert!(wants_rotation(Some(&json!("yes"))));
        for falsy in [json!(false), json!(0), json!("0"), json!("false"), json!("False")] {
            assert!(!wants_rotation(Some(&falsy)), "{falsy} should keep the token");
        }
    }

    #[tokio::test]
    async fn new_device_gets_token() {
        let (storage, _dir) = setup_storage().await;
        let reg = registry(storage.clone(), None);

        let out = reg
            .register(None, req(json!({"device_id": "dev-1", "label": "shelf", "rate_limit_per_min": "20"})))
            .await
            .unwrap();
        assert_eq!(out.status, RegisterStatus::Ok);
        assert!(out.created);
        let token = out.agent_token.clone().unwrap();

        let stored = storage
            .find_active_agent_by_token_hash(&sha256_hex(&token))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.agent_id, out.agent_id);
        assert_eq!(stored.rate_limit_per_min, 20);
        assert_eq!(stored.label.as_deref(), Some("shelf"));
        assert_ne!(stored.token_hash, token);
    }

    #[tokio::test]
    async fn missing_device_id_is_rejected() {
        let (storage, _dir) = setup_storage().await;
        let err = registry(storage, None)
            .register(None, req(json!({"label": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "device_id required");
    }

    #[tokio::test]
    async fn existing_device_rotates_or_reports_exists() {
        let (storage, _dir) = setup_storage().await;
        let reg = registry(storage.clone(), None);
        let first = reg.register(None, req(json!({"device_id": "dev-1"}))).await.unwrap();
        let old_token = first.agent_token.unwrap();

        let kept = reg
            .register(None, req(json!({"device_id": "dev-1", "rotate_token": false})))
            .await
            .unwrap();
        assert_eq!(kept.status, RegisterStatus::Exists);
        assert_eq!(kept.agent_id, first.agent_id);
        assert!(kept.agent_token.is_none());

        let rotated = reg.register(None, req(json!({"device_id": "dev-1"}))).await.unwrap();
        assert_eq!(rotated.status, RegisterStatus::Rotated);
        assert_eq!(rotated.agent_id, first.agent_id);
        let new_token = rotated.agent_token.unwrap();
        assert_ne!(new_token, old_token);
        assert!(
            storage
                .find_active_agent_by_token_hash(&sha256_hex(&old_token))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn secret_is_enforced_and_runtime_value_wins() {
        let (storage, _dir) = setup_storage().await;
        let reg = registry(storage.clone(), Some("from-config"));

        let err = reg.register(None, req(json!({"device_id": "d"}))).await.unwrap_err();
        assert!(matches!(err, SmsGateError::Forbidden(_)));
        reg.register(None, req(json!({"device_id": "d", "registration_secret": "from-config"})))
            .await
            .unwrap();

        reg.set_registration_secret("rotated", "cli").await.unwrap();
        assert_eq!(reg.registration_secret().await.unwrap(), "rotated");
        let err = reg
            .register(None, req(json!({"device_id": "e", "registration_secret": "from-config"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "forbidden: registration_secret invalid");
    }

    #[tokio::test]
    async fn authenticated_agent_updates_profile_only() {
        let (storage, _dir) = setup_storage().await;
        let reg = registry(storage.clone(), Some("s"));
        let out = reg
            .register(None, req(json!({"device_id": "dev-1", "registration_secret": "s", "label": "old"})))
            .await
            .unwrap();
        let record = storage.get_agent(&out.agent_id).await.unwrap().unwrap();

        // No secret needed once authenticated.
        let again = reg
            .register(
                Some(&caller_for(&record)),
                req(json!({"device_id": "dev-1", "capabilities": {"sims": 2}})),
            )
            .await
            .unwrap();
        assert_eq!(again.status, RegisterStatus::Ok);
        assert!(again.agent_token.is_none());

        let record = storage.get_agent(&out.agent_id).await.unwrap().unwrap();
        assert_eq!(record.label.as_deref(), Some("old"));
        assert_eq!(record.capabilities, Some(json!({"sims": 2})));
    }

    #[tokio::test]
    async fn heartbeat_defaults_to_online() {
        let (storage, _dir) = setup_storage().await;
        let reg = registry(storage.clone(), None);
        let out = reg.register(None, req(json!({"device_id": "dev-1"}))).await.unwrap();
        let record = storage.get_agent(&out.agent_id).await.unwrap().unwrap();

        reg.heartbeat(
            &caller_for(&record),
            HeartbeatRequest {
                battery_level: Some(0.42),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let record = storage.get_agent(&out.agent_id).await.unwrap().unwrap();
        assert_eq!(record.status.as_deref(), Some("online"));
        assert_eq!(record.battery_level, Some(0.42));
    }
}
