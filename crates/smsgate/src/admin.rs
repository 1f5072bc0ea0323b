// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator provisioning commands: `api-key`, `template` and
//! `registration-secret`.
//!
//! Each command opens the configured database directly, so they work whether
//! or not `smsgate serve` is running.

use std::sync::Arc;

use smsgate_config::model::SmsGateConfig;
use smsgate_core::principal::{SCOPE_READ, SCOPE_SEND};
use smsgate_core::{PluginAdapter, SmsGateError, StorageAdapter};
use smsgate_dispatch::{AgentRegistry, Provisioner};
use smsgate_storage::SqliteStorage;

/// Audit actor id recorded for CLI actions.
const CLI_OPERATOR: &str = "cli";

pub(crate) async fn open_storage(
    config: &SmsGateConfig,
) -> Result<Arc<dyn StorageAdapter>, SmsGateError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

pub async fn create_api_key(
    config: &SmsGateConfig,
    client: &str,
    scopes: Vec<String>,
    rate_limit_per_day: Option<i64>,
) -> Result<(), SmsGateError> {
    let scopes = if scopes.is_empty() {
        vec![SCOPE_SEND.to_string(), SCOPE_READ.to_string()]
    } else {
        scopes
    };
    let storage = open_storage(config).await?;
    let issued = Provisioner::new(storage.clone(), CLI_OPERATOR)
        .create_api_key(
            client,
            scopes,
            rate_limit_per_day,
            config.intake.default_rate_limit_per_day,
        )
        .await?;
    storage.shutdown().await?;

    println!("api key id:      {}", issued.record.id);
    println!("client:          {}", issued.record.client_name);
    println!("scopes:          {}", issued.record.scopes.join(", "));
    println!("daily limit:     {}", issued.record.rate_limit_per_day);
    println!("key (shown once): {}", issued.plain_key);
    Ok(())
}

pub async fn create_template(
    config: &SmsGateConfig,
    name: &str,
    content: &str,
) -> Result<(), SmsGateError> {
    let storage = open_storage(config).await?;
    let template = Provisioner::new(storage.clone(), CLI_OPERATOR)
        .create_template(name, content)
        .await?;
    storage.shutdown().await?;

    println!("template id: {}", template.id);
    if template.variables.is_empty() {
        println!("variables:   (none)");
    } else {
        println!("variables:   {}", template.variables.join(", "));
    }
    println!("approve with: smsgate template approve {}", template.id);
    Ok(())
}

pub async fn approve_template(config: &SmsGateConfig, id: &str) -> Result<(), SmsGateError> {
    let storage = open_storage(config).await?;
    Provisioner::new(storage.clone(), CLI_OPERATOR)
        .approve_template(id)
        .await?;
    storage.shutdown().await?;
    println!("template {id} approved");
    Ok(())
}

pub async fn set_registration_secret(
    config: &SmsGateConfig,
    secret: &str,
) -> Result<(), SmsGateError> {
    let storage = open_storage(config).await?;
    AgentRegistry::new(storage.clone(), &config.agent)
        .set_registration_secret(secret, CLI_OPERATOR)
        .await?;
    storage.shutdown().await?;
    if secret.is_empty() {
        println!("registration secret cleared; any device may register");
    } else {
        println!("registration secret updated");
    }
    Ok(())
}
