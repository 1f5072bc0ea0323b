// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `smsgate serve` command implementation.
//!
//! Opens SQLite storage, installs the Prometheus recorder when enabled,
//! wires the dispatch services into the HTTP API and serves until a shutdown
//! signal arrives.

use std::sync::Arc;

use smsgate_config::model::SmsGateConfig;
use smsgate_core::{PluginAdapter, SmsGateError, StorageAdapter};
use smsgate_gateway::{AppState, start_server};
use smsgate_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs the `smsgate serve` command.
pub async fn run_serve(config: SmsGateConfig) -> Result<(), SmsGateError> {
    init_tracing(&config.logging.level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.storage.database_path,
        "starting smsgate serve"
    );

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    let mut state = AppState::new(storage.clone(), &config);
    if config.metrics.enabled {
        match smsgate_dispatch::metrics::install_prometheus() {
            Ok(handle) => {
                state = state.with_prometheus(Arc::new(move || handle.render()));
            }
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
            }
        }
    } else {
        debug!("prometheus metrics disabled by configuration");
    }

    let cancel = install_signal_handler();
    let served = start_server(&config.server, state, cancel).await;

    if let Err(e) = storage.shutdown().await {
        error!(error = %e, "storage shutdown failed");
    }
    info!("smsgate serve shutdown complete");
    served
}

/// Cancels the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("received SIGINT (Ctrl+C), initiating shutdown");
                        }
                        _ = sigterm.recv() => {
                            info!("received SIGTERM, initiating shutdown");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("smsgate={log_level},tower_http={log_level},warn"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
