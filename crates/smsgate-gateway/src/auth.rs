// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the HTTP API.
//!
//! Credentials are checked in order:
//! 1. `X-API-Key` header (client systems)
//! 2. `Authorization: Bearer <token>` without a `.` (agent devices)
//! 3. `Authorization: Bearer <jwt>` (operators, HS256)
//!
//! A request with no credentials continues as anonymous; handlers that need
//! a caller answer 401 themselves. Invalid credentials are rejected here.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::Deserialize;
use smsgate_config::model::AuthConfig;
use smsgate_core::{
    AdapterType, AdminUser, AgentCaller, ApiKeyCaller, AuthAdapter, AuthToken, HealthStatus,
    PluginAdapter, Principal, SmsGateError, StorageAdapter,
};
use smsgate_dispatch::token::sha256_hex;

use crate::error::ApiError;
use crate::server::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Pull the raw credential out of request headers.
///
/// A malformed `Authorization` header (wrong scheme, extra parts) is treated
/// as absent.
pub fn extract_token(headers: &HeaderMap) -> Option<AuthToken> {
    if let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(AuthToken::ApiKey(key.to_string()));
    }

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(AuthToken::Bearer(token.to_string())),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AdminClaims {
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    username: Option<String>,
}

/// HS256 verifier for operator tokens.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is checked when present but not required.
        validation.required_spec_claims.clear();
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
            validation.required_spec_claims.insert("iss".to_string());
        }
        match audience {
            Some(aud) => {
                validation.set_audience(&[aud]);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// `None` when no secret is configured.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        let secret = config.jwt_secret.as_deref().filter(|s| !s.is_empty())?;
        Some(Self::new(
            secret,
            config.jwt_issuer.as_deref(),
            config.jwt_audience.as_deref(),
        ))
    }

    pub fn verify(&self, token: &str) -> Result<AdminUser, SmsGateError> {
        let claims = decode::<AdminClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SmsGateError::Unauthorized("Token expired".into()),
                _ => SmsGateError::Unauthorized("Invalid token".into()),
            })?
            .claims;
        let user_id = match claims.sub {
            Some(serde_json::Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        Ok(AdminUser {
            user_id,
            username: claims.username.unwrap_or_else(|| "jwt-user".to_string()),
        })
    }
}

/// The authenticator chain: API keys and agent tokens are looked up by hash
/// in storage, operator JWTs are verified locally.
pub struct Authenticator {
    storage: Arc<dyn StorageAdapter>,
    jwt: Option<JwtVerifier>,
}

impl Authenticator {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: &AuthConfig) -> Self {
        Self {
            storage,
            jwt: JwtVerifier::from_config(config),
        }
    }

    async fn api_key(&self, key: &str) -> Result<Principal, SmsGateError> {
        match self.storage.find_api_key_by_hash(&sha256_hex(key)).await? {
            Some(record) if record.active => Ok(Principal::ApiKey(ApiKeyCaller {
                id: record.id,
                client_name: record.client_name,
                scopes: record.scopes,
                rate_limit_per_day: record.rate_limit_per_day,
            })),
            _ => Err(SmsGateError::Unauthorized("Invalid API key".into())),
        }
    }

    async fn agent_token(&self, token: &str) -> Result<Principal, SmsGateError> {
        match self
            .storage
            .find_active_agent_by_token_hash(&sha256_hex(token))
            .await?
        {
            Some(agent) => Ok(Principal::Agent(AgentCaller {
                agent_id: agent.agent_id,
                device_id: agent.device_id,
                rate_limit_per_min: agent.rate_limit_per_min,
            })),
            None => Err(SmsGateError::Unauthorized("Invalid agent token".into())),
        }
    }
}

#[async_trait]
impl PluginAdapter for Authenticator {
    fn name(&self) -> &str {
        "chain"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Auth
    }

    async fn health_check(&self) -> Result<HealthStatus, SmsGateError> {
        self.storage.health_check().await
    }

    async fn shutdown(&self) -> Result<(), SmsGateError> {
        Ok(())
    }
}

#[async_trait]
impl AuthAdapter for Authenticator {
    async fn authenticate(&self, token: AuthToken) -> Result<Principal, SmsGateError> {
        match token {
            AuthToken::ApiKey(key) => self.api_key(&key).await,
            AuthToken::Bearer(jwt) if jwt.contains('.') => match &self.jwt {
                Some(verifier) => verifier.verify(&jwt).map(Principal::Admin),
                None => Err(SmsGateError::Unauthorized("Invalid token".into())),
            },
            AuthToken::Bearer(token) => self.agent_token(&token).await,
        }
    }
}

/// Resolves the caller once per request and stores it in the request
/// extensions.
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        match state.auth.authenticate(token).await {
            Ok(principal) => {
                tracing::debug!(actor = principal.actor_id(), "request authenticated");
                request.extensions_mut().insert(principal);
            }
            Err(e) => return ApiError::from(e).into_response(),
        }
    }
    next.run(request).await
}

/// Same as [`resolve_principal`], except a rejected credential leaves the
/// request anonymous. Agent registration uses it so a device holding a stale
/// or rotated token can still register again.
pub async fn resolve_principal_lenient(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        match state.auth.authenticate(token).await {
            Ok(principal) => {
                request.extensions_mut().insert(principal);
            }
            Err(e) => tracing::debug!(error = %e, "ignoring rejected credentials"),
        }
    }
    next.run(request).await
}

/// The authenticated caller; 401 when the request carried no credentials.
pub struct Caller(pub Principal);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| ApiError::unauthorized("Authentication credentials were not provided"))
    }
}

/// The caller if one authenticated.
pub struct MaybeCaller(pub Option<Principal>);

impl<S: Send + Sync> FromRequestParts<S> for MaybeCaller {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeCaller(parts.extensions.get::<Principal>().cloned()))
    }
}
