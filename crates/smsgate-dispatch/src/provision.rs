// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator provisioning: API keys and templates.
//!
//! These back the `smsgate` CLI subcommands; every action is audited with
//! the operator as a `user` actor.

use std::sync::Arc;

use chrono::Utc;
use smsgate_core::principal::{SCOPE_READ, SCOPE_SEND};
use smsgate_core::{
    ActorType, ApiKeyRecord, AuditAction, AuditEntry, SmsGateError, StorageAdapter, Template,
};
use tracing::info;

use crate::template::extract_variables;
use crate::token::{API_KEY_BYTES, generate_token, sha256_hex};

/// A freshly created key. The plaintext is never stored and cannot be shown
/// again.
#[derive(Debug, Clone)]
pub struct IssuedApiKey {
    pub record: ApiKeyRecord,
    pub plain_key: String,
}

pub struct Provisioner {
    storage: Arc<dyn StorageAdapter>,
    operator: String,
}

impl Provisioner {
    pub fn new(storage: Arc<dyn StorageAdapter>, operator: impl Into<String>) -> Self {
        Self {
            storage,
            operator: operator.into(),
        }
    }

    async fn audit(&self, action: AuditAction, data: serde_json::Value) -> Result<(), SmsGateError> {
        self.storage
            .append_audit(&AuditEntry::new(
                ActorType::User,
                self.operator.clone(),
                action,
                data,
            ))
            .await
    }

    /// Issue an API key. A non-positive limit falls back to `default_limit`.
    pub async fn create_api_key(
        &self,
        client_name: &str,
        scopes: Vec<String>,
        rate_limit_per_day: Option<i64>,
        default_limit: i64,
    ) -> Result<IssuedApiKey, SmsGateError> {
        if client_name.trim().is_empty() || scopes.is_empty() {
            return Err(SmsGateError::Validation(
                "client_name and scopes required".into(),
            ));
        }
        if let Some(unknown) = scopes
            .iter()
            .find(|s| s.as_str() != SCOPE_SEND && s.as_str() != SCOPE_READ)
        {
            return Err(SmsGateError::Validation(format!("unknown scope: {unknown}")));
        }

        let plain_key = generate_token(API_KEY_BYTES);
        let record = ApiKeyRecord {
            id: uuid::Uuid::new_v4().to_string(),
            client_name: client_name.trim().to_string(),
            key_hash: sha256_hex(&plain_key),
            scopes,
            rate_limit_per_day: rate_limit_per_day
                .filter(|n| *n > 0)
                .unwrap_or(default_limit),
            active: true,
            created_at: Utc::now(),
        };
        self.storage.insert_api_key(&record).await?;
        self.audit(
            AuditAction::CreateApiKey,
            serde_json::json!({"api_key_id": record.id}),
        )
        .await?;
        info!(api_key_id = %record.id, client = %record.client_name, "api key created");
        Ok(IssuedApiKey { record, plain_key })
    }

    /// Store an unapproved template; its variables are derived from content.
    pub async fn create_template(&self, name: &str, content: &str) -> Result<Template, SmsGateError> {
        if name.trim().is_empty() || content.is_empty() {
            return Err(SmsGateError::Validation(
                "name and content are required".into(),
            ));
        }
        let now = Utc::now();
        let template = Template {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            content: content.to_string(),
            variables: extract_variables(content),
            approved: false,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_template(&template).await?;
        self.audit(
            AuditAction::CreateTemplate,
            serde_json::json!({"template_id": template.id}),
        )
        .await?;
        info!(template_id = %template.id, "template created");
        Ok(template)
    }

    pub async fn approve_template(&self, template_id: &str) -> Result<(), SmsGateError> {
        if !self.storage.approve_template(template_id, Utc::now()).await? {
            return Err(SmsGateError::NotFound {
                kind: "template",
                id: template_id.to_string(),
            });
        }
        self.audit(
            AuditAction::ApproveTemplate,
            serde_json::json!({"template_id": template_id}),
        )
        .await?;
        info!(template_id, "template approved");
        Ok(())
    }
}
