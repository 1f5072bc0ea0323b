// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `smsgate status` command implementation.
//!
//! Reads per-status job counts straight from the database.

use std::collections::BTreeMap;

use serde::Serialize;
use smsgate_config::model::SmsGateConfig;
use smsgate_core::{MessageStatus, PluginAdapter, SmsGateError, StorageAdapter};

use crate::admin::open_storage;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database: String,
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

/// Every known status appears, zero-filled, in state-machine order.
fn build_status(database: &str, counts: BTreeMap<String, i64>) -> StatusResponse {
    let mut by_status: BTreeMap<String, i64> = MessageStatus::ALL
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    by_status.extend(counts);
    StatusResponse {
        database: database.to_string(),
        total: by_status.values().sum(),
        by_status,
    }
}

fn render_table(status: &StatusResponse) -> String {
    let mut out = format!("smsgate: {}\n", status.database);
    for s in MessageStatus::ALL {
        let count = status.by_status.get(s.as_str()).copied().unwrap_or(0);
        out.push_str(&format!("  {:<10} {count:>8}\n", s.as_str()));
    }
    out.push_str(&format!("  {:<10} {:>8}\n", "TOTAL", status.total));
    out
}

/// Run the `smsgate status` command.
pub async fn run_status(config: &SmsGateConfig, json: bool) -> Result<(), SmsGateError> {
    let storage = open_storage(config).await?;
    let counts = storage.count_by_status().await?;
    storage.shutdown().await?;

    let status = build_status(&config.storage.database_path, counts);
    if json {
        let rendered = serde_json::to_string_pretty(&status)
            .map_err(|e| SmsGateError::Internal(format!("failed to serialize status: {e}")))?;
        println!("{rendered}");
    } else {
        print!("{}", render_table(&status));
    }
    Ok(())
}
