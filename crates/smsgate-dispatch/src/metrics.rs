// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; the Prometheus recorder is installed once by
//! the binary and rendered on `GET /metrics`.

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smsgate_core::SmsGateError;

/// Install the Prometheus recorder globally and describe all counters.
///
/// Only one recorder can be installed per process.
pub fn install_prometheus() -> Result<PrometheusHandle, SmsGateError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| SmsGateError::Internal(format!("failed to install Prometheus recorder: {e}")))?;
    register_metrics();
    tracing::info!("prometheus metrics recorder installed");
    Ok(handle)
}

pub fn register_metrics() {
    describe_counter!(
        "smsgate_messages_created_total",
        "Jobs accepted as PENDING by intake"
    );
    describe_counter!(
        "smsgate_messages_skipped_total",
        "Jobs cancelled by the dedup window"
    );
    describe_counter!(
        "smsgate_messages_claimed_total",
        "Jobs handed to agents under a lease"
    );
    describe_counter!(
        "smsgate_reports_applied_total",
        "Agent status reports that changed a job"
    );
    describe_counter!(
        "smsgate_intake_rejected_total",
        "Intake calls rejected before persisting"
    );
}

pub fn record_created(count: u64) {
    metrics::counter!("smsgate_messages_created_total").increment(count);
}

pub fn record_skipped(count: u64) {
    metrics::counter!("smsgate_messages_skipped_total").increment(count);
}

pub fn record_claimed(agent_id: &str, count: u64) {
    metrics::counter!("smsgate_messages_claimed_total", "agent_id" => agent_id.to_string())
        .increment(count);
}

pub fn record_reports_applied(count: u64) {
    metrics::counter!("smsgate_reports_applied_total").increment(count);
}

/// `reason` is a short static label: `validation`, `template`, `quota`.
pub fn record_intake_rejected(reason: &'static str) {
    metrics::counter!("smsgate_intake_rejected_total", "reason" => reason).increment(1);
}
