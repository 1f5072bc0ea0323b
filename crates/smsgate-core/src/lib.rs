// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the smsgate dispatch queue.
//!
//! This crate provides the error type, the job state machine, the domain
//! types and the adapter traits used throughout the smsgate workspace.

pub mod error;
pub mod principal;
pub mod status;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SmsGateError;
pub use principal::{AdminUser, AgentCaller, ApiKeyCaller, AuthToken, Principal};
pub use status::{MessageStatus, Priority};
pub use types::{
    ActorType, AdapterType, AgentRecord, ApiKeyRecord, AuditAction, AuditEntry, HealthStatus,
    Heartbeat, MessageQuery, SmsMessage, SmsRequest, StatusUpdate, Template,
};

pub use traits::{AuthAdapter, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Auth] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        let degraded = HealthStatus::Degraded("slow".into());
        let unhealthy = HealthStatus::Unhealthy("down".into());

        assert_eq!(healthy, HealthStatus::Healthy);
        assert_ne!(degraded, healthy);
        assert_ne!(unhealthy, healthy);
    }

    #[test]
    fn adapter_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_auth_adapter<T: AuthAdapter>() {}
    }
}
