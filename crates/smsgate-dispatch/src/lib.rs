// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatch queue's behaviour on top of a [`StorageAdapter`]:
//! request intake with templating, dedup and quota; the lease manager that
//! hands jobs to agents; the report processor; and agent registration.
//!
//! Services are constructed once at startup around a shared storage handle.
//! [`Provisioner`] covers the operator side (API keys and templates) and is
//! built on demand by the CLI.

use std::sync::Arc;

use smsgate_config::model::SmsGateConfig;
use smsgate_core::StorageAdapter;

pub mod intake;
pub mod lease;
pub mod metrics;
pub mod phone;
pub mod provision;
pub mod ratelimit;
pub mod registry;
pub mod report;
pub mod template;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use intake::{IntakeOutcome, IntakeRequest, IntakeService, RecipientSpec};
pub use lease::{LeaseBatch, LeaseManager, LeasedJob};
pub use provision::{IssuedApiKey, Provisioner};
pub use registry::{AgentRegistry, HeartbeatRequest, RegisterOutcome, RegisterRequest, RegisterStatus};
pub use report::{ReportItem, ReportProcessor};

/// All dispatch services, wired to one storage backend.
pub struct Dispatcher {
    pub intake: IntakeService,
    pub leases: LeaseManager,
    pub reports: ReportProcessor,
    pub agents: AgentRegistry,
}

impl Dispatcher {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: &SmsGateConfig) -> Self {
        Self {
            intake: IntakeService::new(storage.clone(), &config.intake),
            leases: LeaseManager::new(storage.clone(), &config.lease),
            reports: ReportProcessor::new(storage.clone()),
            agents: AgentRegistry::new(storage, &config.agent),
        }
    }
}
