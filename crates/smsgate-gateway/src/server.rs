// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use smsgate_config::model::{ServerConfig, SmsGateConfig};
use smsgate_core::{AuthAdapter, SmsGateError, StorageAdapter};
use smsgate_dispatch::Dispatcher;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::auth::{Authenticator, resolve_principal, resolve_principal_lenient};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageAdapter>,
    pub dispatcher: Arc<Dispatcher>,
    pub auth: Arc<dyn AuthAdapter>,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the dispatch services and the authenticator chain around one
    /// storage handle.
    pub fn new(storage: Arc<dyn StorageAdapter>, config: &SmsGateConfig) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(storage.clone(), config)),
            auth: Arc::new(Authenticator::new(storage.clone(), &config.auth)),
            storage,
            prometheus_render: None,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_prometheus(mut self, render: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        self.prometheus_render = Some(render);
        self
    }
}

/// `""`, `"/"` and `"sms/"` become `""`, `""` and `"/sms"`.
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Build the full router, mounted under `base_path` when one is set.
pub fn build_router(state: AppState, base_path: &str) -> Router {
    // Unauthenticated public routes (health + metrics for probes and Prometheus).
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics));

    let api_routes = Router::new()
        .route("/requests", post(handlers::create_request))
        .route("/requests/{request_id}", get(handlers::get_request))
        .route("/messages", get(handlers::list_messages))
        .route("/agent/heartbeat", post(handlers::agent_heartbeat))
        .route("/agent/jobs/next", get(handlers::agent_jobs_next))
        .route("/agent/messages/report", post(handlers::agent_report))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_principal,
        ));

    let register_routes = Router::new()
        .route("/agent/register", post(handlers::agent_register))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_principal_lenient,
        ));

    let routes = Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(register_routes)
        .with_state(state);

    let base = normalize_base_path(base_path);
    let app = if base.is_empty() {
        routes
    } else {
        Router::new().nest(&base, routes)
    };
    app.layer(TraceLayer::new_for_http())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), SmsGateError> {
    let app = build_router(state, &config.base_path);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SmsGateError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!(
        addr = %addr,
        base_path = %normalize_base_path(&config.base_path),
        "smsgate API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SmsGateError::Internal(format!("server error: {e}")))?;

    tracing::info!("smsgate API stopped");
    Ok(())
}
