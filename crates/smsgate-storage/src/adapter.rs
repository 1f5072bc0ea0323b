// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use smsgate_config::model::StorageConfig;
use smsgate_core::{
    AdapterType, AgentRecord, ApiKeyRecord, AuditEntry, HealthStatus, Heartbeat, MessageQuery,
    PluginAdapter, SmsGateError, SmsMessage, SmsRequest, StatusUpdate, StorageAdapter, Template,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates every operation to the query
/// modules. The database is opened on the first call to
/// [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, SmsGateError> {
        self.db.get().ok_or_else(|| SmsGateError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SmsGateError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SmsGateError> {
        if self.db.get().is_some() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), SmsGateError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SmsGateError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), SmsGateError> {
        let db = self.db()?;
        // The handle lives in a OnceCell, so only checkpoint here; the
        // background thread exits when the adapter is dropped.
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    // --- Templates ---

    async fn insert_template(&self, template: &Template) -> Result<(), SmsGateError> {
        queries::templates::insert_template(self.db()?, template).await
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>, SmsGateError> {
        queries::templates::get_template(self.db()?, id).await
    }

    async fn approve_template(&self, id: &str, at: DateTime<Utc>) -> Result<bool, SmsGateError> {
        queries::templates::approve_template(self.db()?, id, at).await
    }

    // --- API keys ---

    async fn insert_api_key(&self, key: &ApiKeyRecord) -> Result<(), SmsGateError> {
        queries::api_keys::insert_api_key(self.db()?, key).await
    }

    async fn find_api_key_by_hash(
        &self,
        key_hash: &str,
    ) -> Result<Option<ApiKeyRecord>, SmsGateError> {
        queries::api_keys::find_api_key_by_hash(self.db()?, key_hash).await
    }

    // --- Agents ---

    async fn insert_agent(&self, agent: &AgentRecord) -> Result<(), SmsGateError> {
        queries::agents::insert_agent(self.db()?, agent).await
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentRecord>, SmsGateError> {
        queries::agents::get_agent(self.db()?, agent_id).await
    }

    async fn find_agent_by_device(
        &self,
        device_id: &str,
    ) -> Result<Option<AgentRecord>, SmsGateError> {
        queries::agents::find_agent_by_device(self.db()?, device_id).await
    }

    async fn find_active_agent_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<AgentRecord>, SmsGateError> {
        queries::agents::find_active_agent_by_token_hash(self.db()?, token_hash).await
    }

    async fn rotate_agent_token(
        &self,
        agent_id: &str,
        token_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError> {
        queries::agents::rotate_agent_token(self.db()?, agent_id, token_hash, at).await
    }

    async fn update_agent_profile(
        &self,
        agent_id: &str,
        label: Option<String>,
        capabilities: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError> {
        queries::agents::update_agent_profile(self.db()?, agent_id, label, capabilities, at).await
    }

    async fn record_heartbeat(
        &self,
        agent_id: &str,
        heartbeat: &Heartbeat,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError> {
        queries::agents::record_heartbeat(self.db()?, agent_id, heartbeat, at).await
    }

    // --- Runtime configuration ---

    async fn get_app_config(&self, key: &str) -> Result<Option<String>, SmsGateError> {
        queries::app_config::get_app_config(self.db()?, key).await
    }

    async fn set_app_config(
        &self,
        key: &str,
        value: &str,
        updated_by: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SmsGateError> {
        queries::app_config::set_app_config(self.db()?, key, value, updated_by, at).await
    }

    // --- Requests and jobs ---

    async fn daily_usage(&self, api_key_id: &str, day_bucket: &str) -> Result<i64, SmsGateError> {
        queries::requests::daily_usage(self.db()?, api_key_id, day_bucket).await
    }

    async fn has_recent_duplicate(
        &self,
        to: &str,
        text: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SmsGateError> {
        queries::messages::has_recent_duplicate(self.db()?, to, text, since).await
    }

    async fn insert_request(
        &self,
        request: &SmsRequest,
        messages: &[SmsMessage],
    ) -> Result<(), SmsGateError> {
        queries::requests::insert_request(self.db()?, request, messages).await
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<SmsRequest>, SmsGateError> {
        queries::requests::get_request(self.db()?, request_id).await
    }

    async fn status_counts(
        &self,
        request_id: &str,
    ) -> Result<BTreeMap<String, i64>, SmsGateError> {
        queries::messages::status_counts(self.db()?, request_id).await
    }

    async fn count_by_status(&self) -> Result<BTreeMap<String, i64>, SmsGateError> {
        queries::messages::count_by_status(self.db()?).await
    }

    async fn get_message(&self, message_id: &str) -> Result<Option<SmsMessage>, SmsGateError> {
        queries::messages::get_message(self.db()?, message_id).await
    }

    async fn list_messages(&self, query: &MessageQuery) -> Result<Vec<SmsMessage>, SmsGateError> {
        queries::messages::list_messages(self.db()?, query).await
    }

    // --- Lease protocol ---

    async fn claim_next(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<SmsMessage>, SmsGateError> {
        queries::lease::claim_next(self.db()?, agent_id, now, lease_until).await
    }

    async fn apply_status_update(&self, update: &StatusUpdate) -> Result<bool, SmsGateError> {
        queries::lease::apply_status_update(self.db()?, update).await
    }

    // --- Audit ---

    async fn append_audit(&self, entry: &AuditEntry) -> Result<(), SmsGateError> {
        queries::audit::append_audit(self.db()?, entry).await
    }

    async fn recent_audit(&self, limit: i64) -> Result<Vec<AuditEntry>, SmsGateError> {
        queries::audit::recent_audit(self.db()?, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smsgate_core::MessageStatus;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists());
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_check_requires_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(storage.health_check().await.is_err());
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn job_lifecycle_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let now = Utc::now();
        let request = crate::queries::test_support::request("r1", "k1", now);
        let job = crate::queries::test_support::message("m1", "r1", "+84901234567", now);
        storage.insert_request(&request, &[job]).await.unwrap();

        let lease_until = now + chrono::Duration::seconds(300);
        let claimed = storage.claim_next("a1", now, lease_until).await.unwrap().unwrap();
        assert_eq!(claimed.message_id, "m1");

        let applied = storage
            .apply_status_update(&StatusUpdate {
                message_id: "m1".into(),
                agent_id: "a1".into(),
                status: MessageStatus::Sent,
                last_error: None,
                at: now,
            })
            .await
            .unwrap();
        assert!(applied);

        let counts = storage.status_counts("r1").await.unwrap();
        assert_eq!(counts.get("SENT"), Some(&1));
        assert_eq!(storage.count_by_status().await.unwrap().get("SENT"), Some(&1));

        storage.shutdown().await.unwrap();
    }
}
