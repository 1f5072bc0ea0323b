// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete smsgate pipeline.
//!
//! Each test creates an isolated TestHarness with temp SQLite, a seeded API
//! key, an approved template and one registered agent. Tests are independent
//! and order-insensitive.

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use smsgate_config::model::SmsGateConfig;
use smsgate_core::{AgentCaller, MessageStatus, StorageAdapter};
use smsgate_dispatch::Provisioner;
use smsgate_test_utils::{Auth, TestHarness};

fn otp_request(template_id: &str, recipients: &[(&str, &str)]) -> Value {
    let messages: Vec<Value> = recipients
        .iter()
        .map(|(to, code)| json!({"to": to, "variables": {"CODE": code}}))
        .collect();
    json!({"template_id": template_id, "messages": messages})
}

async fn lease(harness: &TestHarness, auth: Auth<'_>, limit: usize) -> Vec<Value> {
    let (status, body) = harness
        .get(&format!("/agent/jobs/next?limit={limit}"), auth)
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK, "lease failed: {body}");
    body["messages"].as_array().cloned().unwrap_or_default()
}

// ---- Intake to delivery ----

#[tokio::test]
async fn test_message_reaches_delivered() {
    let harness = TestHarness::builder().build().await.unwrap();

    let (status, created) = harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901234567", "4711")]),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["total_created"], 1);
    let request_id = created["request_id"].as_str().unwrap().to_string();

    let jobs = lease(&harness, harness.agent_auth(), 10).await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["to"], "+84901234567");
    assert_eq!(jobs[0]["text"], "OTP 4711");
    let message_id = jobs[0]["message_id"].as_str().unwrap().to_string();

    for next in ["SENDING", "SENT", "DELIVERED"] {
        let (status, body) = harness
            .post(
                "/agent/messages/report",
                harness.agent_auth(),
                json!({"messages": [{"message_id": message_id, "status": next}]}),
            )
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated"], 1, "transition to {next} should apply");
    }

    let (status, detail) = harness
        .get(&format!("/requests/{request_id}"), harness.api_auth())
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["status_counts"]["DELIVERED"], 1);

    let stored = harness.storage.get_message(&message_id).await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Delivered);
    assert!(stored.lease_until.is_none());
}

#[tokio::test]
async fn test_failed_report_keeps_error_text() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();
    let jobs = lease(&harness, harness.agent_auth(), 1).await;
    let message_id = jobs[0]["message_id"].as_str().unwrap();

    let (_, body) = harness
        .post(
            "/agent/messages/report",
            harness.agent_auth(),
            json!({"messages": [{"message_id": message_id, "status": "FAILED", "last_error": "no signal"}]}),
        )
        .await
        .unwrap();
    assert_eq!(body["updated"], 1);

    let (_, listing) = harness
        .get(
            &format!("/messages?request_id={}&status=FAILED", jobs[0]["request_id"].as_str().unwrap()),
            harness.api_auth(),
        )
        .await
        .unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["items"][0]["last_error"], "no signal");
}

// ---- Intake rules ----

#[tokio::test]
async fn test_unapproved_template_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let draft = Provisioner::new(harness.storage.clone(), "test")
        .create_template("draft", "Hi {NAME}")
        .await
        .unwrap();

    let (status, body) = harness
        .post(
            "/requests",
            harness.api_auth(),
            json!({"template_id": draft.id, "messages": [{"to": "0901234567", "variables": {"NAME": "An"}}]}),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not approved"));
    assert!(harness.storage.count_by_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_variable_rejects_whole_request() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (status, body) = harness
        .post(
            "/requests",
            harness.api_auth(),
            json!({"template_id": harness.template_id, "messages": [
                {"to": "0901234567", "variables": {"CODE": "1"}},
                {"to": "0901234568", "variables": {}}
            ]}),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing variable CODE");
    assert!(harness.storage.count_by_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_daily_quota_returns_429() {
    let harness = TestHarness::builder()
        .with_rate_limit_per_day(2)
        .build()
        .await
        .unwrap();

    let (status, _) = harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901000001", "1"), ("0901000002", "2")]),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901000003", "3")]),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Daily rate limit exceeded");
}

#[tokio::test]
async fn test_recent_duplicate_is_skipped() {
    let harness = TestHarness::builder().build().await.unwrap();
    let body = otp_request(&harness.template_id, &[("0901234567", "9")]);

    let (_, first) = harness.post("/requests", harness.api_auth(), body.clone()).await.unwrap();
    let (status, second) = harness.post("/requests", harness.api_auth(), body).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["total_created"], 1);
    assert_eq!(second["total_created"], 0);
    assert_eq!(second["total_skipped"], 1);

    let counts = harness.storage.count_by_status().await.unwrap();
    assert_eq!(counts.get("PENDING"), Some(&1));
    assert_eq!(counts.get("CANCELED"), Some(&1));
}

// ---- Scopes and ownership ----

#[tokio::test]
async fn test_read_only_key_cannot_send() {
    let harness = TestHarness::builder()
        .with_scopes(&["sms:read"])
        .build()
        .await
        .unwrap();
    let (status, body) = harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "sms:send scope required");
}

#[tokio::test]
async fn test_other_client_cannot_read_request() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (_, created) = harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();

    let other = Provisioner::new(harness.storage.clone(), "test")
        .create_api_key("other", vec!["sms:read".into()], None, 100)
        .await
        .unwrap();
    let (status, body) = harness
        .get(
            &format!("/requests/{}", created["request_id"].as_str().unwrap()),
            Auth::ApiKey(&other.plain_key),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Not authorized");
}

#[tokio::test]
async fn test_agent_token_cannot_submit_requests() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (status, _) = harness
        .post(
            "/requests",
            harness.agent_auth(),
            otp_request(&harness.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = harness.get("/agent/jobs/next", harness.api_auth()).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ---- Leasing ----

#[tokio::test]
async fn test_agents_never_share_a_job() {
    let harness = TestHarness::builder().build().await.unwrap();
    let recipients: Vec<(String, String)> = (0..6)
        .map(|i| (format!("09010000{i:02}"), i.to_string()))
        .collect();
    let refs: Vec<(&str, &str)> = recipients.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    harness
        .post("/requests", harness.api_auth(), otp_request(&harness.template_id, &refs))
        .await
        .unwrap();

    let (_, second_token) = harness.register_agent("second-device").await.unwrap();
    let first = lease(&harness, harness.agent_auth(), 4).await;
    let second = lease(&harness, Auth::Bearer(&second_token), 4).await;
    assert_eq!(first.len(), 4);
    assert_eq!(second.len(), 2);

    let mut ids: Vec<&str> = first
        .iter()
        .chain(second.iter())
        .map(|j| j["message_id"].as_str().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 6);

    assert!(lease(&harness, harness.agent_auth(), 4).await.is_empty());
}

#[tokio::test]
async fn test_expired_lease_returns_to_same_agent_only() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();
    let first = lease(&harness, harness.agent_auth(), 1).await;
    let message_id = first[0]["message_id"].as_str().unwrap().to_string();

    let later = Utc::now() + Duration::minutes(10);
    let leases = &harness.state.dispatcher.leases;
    let (other_id, _) = harness.register_agent("other-device").await.unwrap();
    let other = AgentCaller {
        agent_id: other_id,
        device_id: "other-device".into(),
        rate_limit_per_min: 10,
    };
    let stolen = leases.claim_batch_at(&other, 5, later).await.unwrap();
    assert!(stolen.messages.is_empty());

    let owner = AgentCaller {
        agent_id: harness.agent_id.clone(),
        device_id: "harness-device".into(),
        rate_limit_per_min: 10,
    };
    let reclaimed = leases.claim_batch_at(&owner, 5, later).await.unwrap();
    assert_eq!(reclaimed.messages.len(), 1);
    assert_eq!(reclaimed.messages[0].message_id, message_id);
}

#[tokio::test]
async fn test_report_from_non_owner_is_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness
        .post(
            "/requests",
            harness.api_auth(),
            otp_request(&harness.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();
    let jobs = lease(&harness, harness.agent_auth(), 1).await;
    let (_, intruder) = harness.register_agent("intruder").await.unwrap();

    let (status, body) = harness
        .post(
            "/agent/messages/report",
            Auth::Bearer(&intruder),
            json!({"messages": [{"message_id": jobs[0]["message_id"], "status": "SENT"}]}),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updated"], 0);
}

// ---- Agents ----

#[tokio::test]
async fn test_registration_secret_is_enforced() {
    let mut config = SmsGateConfig::default();
    config.agent.registration_secret = Some("letmein".into());
    let harness = TestHarness::builder().with_config(config).build().await.unwrap();

    let (status, body) = harness
        .post(
            "/agent/register",
            Auth::None,
            json!({"device_id": "rogue", "registration_secret": "wrong"}),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "registration_secret invalid");

    let (status, body) = harness
        .post(
            "/agent/register",
            Auth::None,
            json!({"device_id": "phone-2", "registration_secret": "letmein"}),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["agent_token"].is_string());
}

#[tokio::test]
async fn test_heartbeat_updates_agent() {
    let harness = TestHarness::builder().build().await.unwrap();
    let (status, body) = harness
        .post(
            "/agent/heartbeat",
            harness.agent_auth(),
            json!({"status": "online", "battery_level": 77.0, "app_version": "2.1.0"}),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let agent = harness.storage.get_agent(&harness.agent_id).await.unwrap().unwrap();
    assert_eq!(agent.app_version.as_deref(), Some("2.1.0"));
    assert!(agent.last_seen_at.is_some());
}

// ---- Harness ----

#[tokio::test]
async fn test_harness_isolation() {
    let h1 = TestHarness::builder().build().await.unwrap();
    let h2 = TestHarness::builder().build().await.unwrap();
    assert_ne!(h1.api_key, h2.api_key);

    let (status, _) = h2
        .post(
            "/requests",
            Auth::ApiKey(&h1.api_key),
            otp_request(&h2.template_id, &[("0901234567", "1")]),
        )
        .await
        .unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
