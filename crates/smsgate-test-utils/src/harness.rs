// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete stack on a temp SQLite database:
//! an approved `OTP {CODE}` template, an API key with both scopes, one
//! registered agent, and the fully wired router. Requests are driven through
//! the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use smsgate_config::model::{SmsGateConfig, StorageConfig};
use smsgate_core::principal::{SCOPE_READ, SCOPE_SEND};
use smsgate_core::{SmsGateError, StorageAdapter};
use smsgate_dispatch::{Provisioner, RegisterRequest};
use smsgate_gateway::{AppState, build_router, normalize_base_path};
use smsgate_storage::SqliteStorage;
use tower::ServiceExt;

/// Credential to attach to a harness request.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    None,
    ApiKey(&'a str),
    Bearer(&'a str),
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: SmsGateConfig,
    scopes: Vec<String>,
    rate_limit_per_day: i64,
    template_content: String,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: SmsGateConfig::default(),
            scopes: vec![SCOPE_SEND.to_string(), SCOPE_READ.to_string()],
            rate_limit_per_day: 1_000,
            template_content: "OTP {CODE}".to_string(),
        }
    }

    /// Start from a custom configuration. The storage section is replaced
    /// with the harness's temp database.
    pub fn with_config(mut self, config: SmsGateConfig) -> Self {
        self.config = config;
        self
    }

    /// Scopes granted to the seeded API key.
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Daily quota of the seeded API key.
    pub fn with_rate_limit_per_day(mut self, limit: i64) -> Self {
        self.rate_limit_per_day = limit;
        self
    }

    /// Content of the seeded, approved template.
    pub fn with_template(mut self, content: impl Into<String>) -> Self {
        self.template_content = content.into();
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, SmsGateError> {
        let temp_dir = tempfile::TempDir::new().map_err(SmsGateError::storage)?;
        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let provisioner = Provisioner::new(storage.clone(), "harness");
        let template = provisioner
            .create_template("otp", &self.template_content)
            .await?;
        provisioner.approve_template(&template.id).await?;
        let issued = provisioner
            .create_api_key(
                "harness-client",
                self.scopes,
                Some(self.rate_limit_per_day),
                config.intake.default_rate_limit_per_day,
            )
            .await?;

        let state = AppState::new(storage.clone(), &config);
        let registered = state
            .dispatcher
            .agents
            .register(
                None,
                RegisterRequest {
                    device_id: Some("harness-device".to_string()),
                    registration_secret: config.agent.registration_secret.clone(),
                    ..RegisterRequest::default()
                },
            )
            .await?;
        let agent_token = registered
            .agent_token
            .ok_or_else(|| SmsGateError::Internal("registration issued no token".into()))?;

        let router = build_router(state.clone(), &config.server.base_path);

        Ok(TestHarness {
            storage,
            state,
            router,
            base_path: normalize_base_path(&config.server.base_path),
            config,
            api_key: issued.plain_key,
            api_key_id: issued.record.id,
            template_id: template.id,
            agent_id: registered.agent_id,
            agent_token,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with temp storage and a wired router.
pub struct TestHarness {
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub state: AppState,
    pub router: Router,
    pub config: SmsGateConfig,
    base_path: String,
    /// Plaintext of the seeded API key.
    pub api_key: String,
    pub api_key_id: String,
    /// Id of the seeded, approved template.
    pub template_id: String,
    pub agent_id: String,
    /// Bearer token of the seeded agent.
    pub agent_token: String,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn api_auth(&self) -> Auth<'_> {
        Auth::ApiKey(&self.api_key)
    }

    pub fn agent_auth(&self) -> Auth<'_> {
        Auth::Bearer(&self.agent_token)
    }

    /// Send one request through the router. `path` is relative to the
    /// configured base path. Non-JSON bodies come back as `Value::Null`.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        auth: Auth<'_>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), SmsGateError> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{path}", self.base_path));
        builder = match auth {
            Auth::None => builder,
            Auth::ApiKey(key) => builder.header("x-api-key", key),
            Auth::Bearer(token) => builder.header("authorization", format!("Bearer {token}")),
        };
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| SmsGateError::Internal(format!("bad test request: {e}")))?;

        let response = match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| SmsGateError::Internal(format!("unreadable response body: {e}")))?;
        Ok((status, serde_json::from_slice(&bytes).unwrap_or(Value::Null)))
    }

    pub async fn get(&self, path: &str, auth: Auth<'_>) -> Result<(StatusCode, Value), SmsGateError> {
        self.call(Method::GET, path, auth, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        auth: Auth<'_>,
        body: Value,
    ) -> Result<(StatusCode, Value), SmsGateError> {
        self.call(Method::POST, path, auth, Some(body)).await
    }

    /// Register another device and return `(agent_id, token)`.
    pub async fn register_agent(&self, device_id: &str) -> Result<(String, String), SmsGateError> {
        let outcome = self
            .state
            .dispatcher
            .agents
            .register(
                None,
                RegisterRequest {
                    device_id: Some(device_id.to_string()),
                    registration_secret: self.config.agent.registration_secret.clone(),
                    ..RegisterRequest::default()
                },
            )
            .await?;
        let token = outcome
            .agent_token
            .ok_or_else(|| SmsGateError::Internal("registration issued no token".into()))?;
        Ok((outcome.agent_id, token))
    }
}
