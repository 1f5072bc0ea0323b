// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request intake: validate a batch, render per-recipient text, apply the
//! dedup window and daily quota, then persist jobs and summary together.
//!
//! Every rejection happens before the single storage write, so a failed call
//! leaves nothing behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smsgate_config::model::IntakeConfig;
use smsgate_core::types::{DUPLICATE_RECENT, day_bucket, parse_timestamp};
use smsgate_core::{
    ActorType, ApiKeyCaller, AuditAction, AuditEntry, MessageStatus, Priority, SmsGateError,
    SmsMessage, SmsRequest, StorageAdapter,
};
use tracing::{debug, info};

use crate::metrics;
use crate::phone::PhonePolicy;
use crate::ratelimit::{RateLimiter, check_quota};
use crate::template::{self, Variables};

/// Body of `POST /requests`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntakeRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<RecipientSpec>>,
    /// Defaults applied to every recipient.
    #[serde(default)]
    pub variables: Option<Variables>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// One recipient in an intake batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipientSpec {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub variables: Option<Variables>,
    #[serde(default)]
    pub schedule_at: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

/// Result of an accepted intake call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeOutcome {
    pub request_id: String,
    pub total_created: i64,
    pub total_skipped: i64,
}

pub struct IntakeService {
    storage: Arc<dyn StorageAdapter>,
    limiter: RateLimiter,
    phone: PhonePolicy,
    max_recipients: usize,
    max_text_length: usize,
}

impl IntakeService {
    pub fn new(storage: Arc<dyn StorageAdapter>, config: &IntakeConfig) -> Self {
        Self {
            limiter: RateLimiter::new(storage.clone(), config.dedup_window_minutes),
            storage,
            phone: PhonePolicy::from_config(config),
            max_recipients: config.max_recipients_per_request,
            max_text_length: config.max_text_length,
        }
    }

    pub async fn submit(
        &self,
        caller: &ApiKeyCaller,
        request: IntakeRequest,
    ) -> Result<IntakeOutcome, SmsGateError> {
        self.submit_at(caller, request, Utc::now()).await
    }

    /// [`IntakeService::submit`] with an explicit clock.
    pub async fn submit_at(
        &self,
        caller: &ApiKeyCaller,
        request: IntakeRequest,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, SmsGateError> {
        let result = self.prepare_and_store(caller, request, now).await;
        if let Err(e) = &result {
            metrics::record_intake_rejected(match e {
                SmsGateError::RateLimited { .. } => "quota",
                SmsGateError::TemplateNotApproved { .. } => "template",
                e if e.is_client_error() => "validation",
                _ => "internal",
            });
        }
        result
    }

    async fn prepare_and_store(
        &self,
        caller: &ApiKeyCaller,
        request: IntakeRequest,
        now: DateTime<Utc>,
    ) -> Result<IntakeOutcome, SmsGateError> {
        let template_id = request.template_id.filter(|t| !t.is_empty());
        let recipients = request.messages.unwrap_or_default();
        let Some(template_id) = template_id.filter(|_| !recipients.is_empty()) else {
            return Err(SmsGateError::Validation(
                "template_id and messages are required".into(),
            ));
        };
        if recipients.len() > self.max_recipients {
            return Err(SmsGateError::Validation("Too many recipients".into()));
        }

        let template = match self.storage.get_template(&template_id).await? {
            Some(t) if t.approved => t,
            _ => return Err(SmsGateError::TemplateNotApproved { template_id }),
        };

        let bucket = day_bucket(&now);
        let usage = self.limiter.usage(&caller.id, now).await?;
        let defaults = request.variables.unwrap_or_default();
        let default_priority = request.priority;
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut jobs = Vec::with_capacity(recipients.len());
        let mut skipped = 0i64;
        for spec in recipients {
            let to = self.phone.normalize(spec.to.as_deref().unwrap_or_default())?;
            let variables =
                template::merge_variables(&defaults, &spec.variables.unwrap_or_default());
            let text = template::render(&template.content, &variables)?;
            if text.chars().count() > self.max_text_length {
                return Err(SmsGateError::Validation(format!(
                    "Text exceeds max_text_length ({})",
                    self.max_text_length
                )));
            }
            let schedule_at = spec
                .schedule_at
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(parse_timestamp)
                .transpose()?;

            let duplicate = self.limiter.is_recent_duplicate(&to, &text, now).await?;
            if duplicate {
                skipped += 1;
            }
            let priority = Priority::resolve(
                spec.priority
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .or(default_priority.as_deref()),
            );

            jobs.push(SmsMessage {
                message_id: uuid::Uuid::new_v4().to_string(),
                request_id: request_id.clone(),
                api_key_id: caller.id.clone(),
                client_name: caller.client_name.clone(),
                template_id: template_id.clone(),
                vars_hash: template::vars_hash(&variables),
                to,
                text,
                variables,
                schedule_at,
                status: if duplicate {
                    MessageStatus::Canceled
                } else {
                    MessageStatus::Pending
                },
                priority,
                priority_weight: priority.weight(),
                lease_until: None,
                agent_id: None,
                attempts: 0,
                last_error: duplicate.then(|| DUPLICATE_RECENT.to_string()),
                metadata: request.metadata.clone(),
                created_at: now,
                updated_at: now,
                sent_at: None,
                delivered_at: None,
            });
        }

        let accepted = jobs.len() as i64 - skipped;
        check_quota(usage, accepted, caller.rate_limit_per_day)?;

        let mut status_counts = BTreeMap::new();
        for job in &jobs {
            *status_counts.entry(job.status.as_str().to_string()).or_insert(0) += 1;
        }
        let summary = SmsRequest {
            request_id: request_id.clone(),
            api_key_id: caller.id.clone(),
            client_name: caller.client_name.clone(),
            template_id,
            total_created: accepted,
            total_skipped: skipped,
            total_accepted: accepted,
            day_bucket: bucket,
            status_counts,
            metadata: request.metadata,
            created_at: now,
        };
        self.storage.insert_request(&summary, &jobs).await?;
        debug!(request_id = %request_id, jobs = jobs.len(), "request persisted");

        self.storage
            .append_audit(&AuditEntry::new(
                ActorType::ApiKey,
                caller.id.clone(),
                AuditAction::CreateSmsRequest,
                serde_json::json!({
                    "request_id": request_id,
                    "total_created": accepted,
                    "total_skipped": skipped,
                }),
            ))
            .await?;

        metrics::record_created(accepted as u64);
        metrics::record_skipped(skipped as u64);
        info!(
            request_id = %request_id,
            api_key_id = %caller.id,
            created = accepted,
            skipped,
            "sms request accepted"
        );

        Ok(IntakeOutcome {
            request_id,
            total_created: accepted,
            total_skipped: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{api_caller, seed_template, setup_storage};
    use serde_json::json;
    use smsgate_core::MessageQuery;

    fn body(template_id: &str, recipients: serde_json::Value) -> IntakeRequest {
        serde_json::from_value(json!({
            "template_id": template_id,
            "messages": recipients,
        }))
        .unwrap()
    }

    fn service(storage: Arc<dyn StorageAdapter>) -> IntakeService {
        IntakeService::new(storage, &IntakeConfig::default())
    }

    async fn jobs(storage: &Arc<dyn StorageAdapter>, request_id: &str) -> Vec<SmsMessage> {
        storage
            .list_messages(&MessageQuery {
                request_id: request_id.into(),
                status: None,
                api_key_id: None,
                limit: 500,
                skip: 0,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_batch_twice_inside_window_is_skipped() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "t1", "OTP {CODE}", true).await;
        let svc = service(storage.clone());
        let caller = api_caller("k1", 100);
        let recipients = json!([
            {"to": "0901234567", "variables": {"CODE": "111"}},
            {"to": "0901234567", "variables": {"CODE": "111"}},
        ]);

        let first = svc.submit(&caller, body("t1", recipients.clone())).await.unwrap();
        assert_eq!((first.total_created, first.total_skipped), (2, 0));

        let second = svc.submit(&caller, body("t1", recipients)).await.unwrap();
        assert_eq!((second.total_created, second.total_skipped), (0, 2));

        for job in jobs(&storage, &second.request_id).await {
            assert_eq!(job.status, MessageStatus::Canceled);
            assert_eq!(job.last_error.as_deref(), Some(DUPLICATE_RECENT));
            assert_eq!(job.to, "+84901234567");
            assert_eq!(job.text, "OTP 111");
        }
        let summary = storage.get_request(&second.request_id).await.unwrap().unwrap();
        assert_eq!(summary.total_accepted, 0);
        assert_eq!(summary.status_counts.get("CANCELED"), Some(&2));
    }

    #[tokio::test]
    async fn duplicate_outside_window_is_accepted() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "t1", "OTP {CODE}", true).await;
        let svc = service(storage.clone());
        let caller = api_caller("k1", 100);
        let recipients = json!([{"to": "0901234567", "variables": {"CODE": "111"}}]);

        let earlier = Utc::now() - chrono::Duration::minutes(10);
        svc.submit_at(&caller, body("t1", recipients.clone()), earlier)
            .await
            .unwrap();
        let again = svc.submit(&caller, body("t1", recipients)).await.unwrap();
        assert_eq!((again.total_created, again.total_skipped), (1, 0));
    }

    #[tokio::test]
    async fn quota_overflow_persists_nothing() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "t1", "Hi {NAME}", true).await;
        let svc = service(storage.clone());
        let caller = api_caller("k1", 10);

        let seven: Vec<_> = (0..7)
            .map(|i| json!({"to": format!("09000000{i:02}"), "variables": {"NAME": "a"}}))
            .collect();
        let ok = svc.submit(&caller, body("t1", json!(seven))).await.unwrap();
        assert_eq!(ok.total_created, 7);

        let five: Vec<_> = (10..15)
            .map(|i| json!({"to": format!("09000000{i:02}"), "variables": {"NAME": "b"}}))
            .collect();
        let err = svc.submit(&caller, body("t1", json!(five))).await.unwrap_err();
        assert!(matches!(
            err,
            SmsGateError::RateLimited {
                usage: 7,
                requested: 5,
                limit: 10
            }
        ));

        let counts = storage.count_by_status().await.unwrap();
        assert_eq!(counts.get("PENDING"), Some(&7));
        assert_eq!(storage.daily_usage("k1", &day_bucket(&Utc::now())).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn missing_variable_fails_whole_call() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "t1", "Hi {NAME}, code {CODE}", true).await;
        let svc = service(storage.clone());
        let err = svc
            .submit(
                &api_caller("k1", 100),
                body(
                    "t1",
                    json!([
                        {"to": "0901111111", "variables": {"NAME": "An", "CODE": "1"}},
                        {"to": "0902222222", "variables": {"NAME": "Binh"}},
                    ]),
                ),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing variable CODE");
        assert!(storage.count_by_status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn template_must_exist_and_be_approved() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "draft", "OTP {CODE}", false).await;
        let svc = service(storage.clone());
        let caller = api_caller("k1", 100);
        let recipients = json!([{"to": "0901234567", "variables": {"CODE": "1"}}]);

        for id in ["draft", "missing"] {
            let err = svc.submit(&caller, body(id, recipients.clone())).await.unwrap_err();
            assert!(matches!(err, SmsGateError::TemplateNotApproved { .. }));
        }
    }

    #[tokio::test]
    async fn shape_and_limit_validation() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "t1", "{BODY}", true).await;
        let config = IntakeConfig {
            max_recipients_per_request: 2,
            max_text_length: 5,
            ..IntakeConfig::default()
        };
        let svc = IntakeService::new(storage.clone(), &config);
        let caller = api_caller("k1", 100);

        let err = svc.submit(&caller, body("t1", json!([]))).await.unwrap_err();
        assert_eq!(err.to_string(), "template_id and messages are required");

        let err = svc
            .submit(&caller, IntakeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "template_id and messages are required");

        let three = json!([{"to": "0901"}, {"to": "0902"}, {"to": "0903"}]);
        let err = svc.submit(&caller, body("t1", three)).await.unwrap_err();
        assert_eq!(err.to_string(), "Too many recipients");

        let long = json!([{"to": "0901234567", "variables": {"BODY": "toolong"}}]);
        let err = svc.submit(&caller, body("t1", long)).await.unwrap_err();
        assert!(matches!(err, SmsGateError::Validation(_)));

        let no_phone = json!([{"variables": {"BODY": "hi"}}]);
        let err = svc.submit(&caller, body("t1", no_phone)).await.unwrap_err();
        assert_eq!(err.to_string(), "Phone number required");

        let foreign = json!([{"to": "+14155550100", "variables": {"BODY": "hi"}}]);
        let err = svc.submit(&caller, body("t1", foreign)).await.unwrap_err();
        assert_eq!(err.to_string(), "International numbers are blocked");

        let bad_schedule =
            json!([{"to": "0901234567", "variables": {"BODY": "hi"}, "schedule_at": "soon"}]);
        let err = svc.submit(&caller, body("t1", bad_schedule)).await.unwrap_err();
        assert!(matches!(err, SmsGateError::Validation(_)));

        assert!(storage.count_by_status().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn defaults_priority_and_schedule_are_applied() {
        let (storage, _dir) = setup_storage().await;
        seed_template(&storage, "t1", "{BRAND}: {CODE}", true).await;
        let svc = service(storage.clone());
        let request: IntakeRequest = serde_json::from_value(json!({
            "template_id": "t1",
            "variables": {"BRAND": "Shop", "CODE": "000"},
            "priority": "low",
            "metadata": {"campaign": "x"},
            "messages": [
                {"to": "0901111111", "variables": {"CODE": "111"}, "priority": "HIGH"},
                {"to": "0902222222", "schedule_at": "2030-01-01T08:00:00+07:00"},
                {"to": "0903333333", "priority": "urgent"},
            ],
        }))
        .unwrap();
        let out = svc.submit(&api_caller("k1", 100), request).await.unwrap();
        assert_eq!(out.total_created, 3);

        let all = jobs(&storage, &out.request_id).await;
        let by_to = |to: &str| all.iter().find(|m| m.to == to).unwrap().clone();

        let first = by_to("+84901111111");
        assert_eq!(first.text, "Shop: 111");
        assert_eq!(first.priority, Priority::High);
        assert_eq!(first.priority_weight, 0);
        assert_eq!(first.metadata, Some(json!({"campaign": "x"})));
        assert_eq!(first.api_key_id, "k1");

        let second = by_to("+84902222222");
        assert_eq!(second.text, "Shop: 000");
        assert_eq!(second.priority, Priority::Low);
        assert_eq!(
            second.schedule_at.map(|t| smsgate_core::types::format_timestamp(&t)),
            Some("2030-01-01T01:00:00.000Z".to_string())
        );

        // Unknown priority strings fall back to NORMAL.
        assert_eq!(by_to("+84903333333").priority, Priority::Normal);

        let audit = storage.recent_audit(5).await.unwrap();
        assert_eq!(audit[0].action, AuditAction::CreateSmsRequest);
        assert_eq!(audit[0].data["request_id"], out.request_id);
    }
}
