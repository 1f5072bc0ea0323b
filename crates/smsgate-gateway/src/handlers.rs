// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.
//!
//! Caller-facing: `POST /requests`, `GET /requests/{request_id}`,
//! `GET /messages`. Agent-facing: `POST /agent/register`,
//! `POST /agent/heartbeat`, `GET /agent/jobs/next`,
//! `POST /agent/messages/report`. Public: `GET /health`, `GET /metrics`.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use smsgate_core::types::format_timestamp;
use smsgate_core::{AgentCaller, ApiKeyCaller, MessageQuery, Principal, SmsMessage};
use smsgate_dispatch::{
    HeartbeatRequest, IntakeOutcome, IntakeRequest, LeasedJob, RegisterOutcome, RegisterRequest,
    ReportItem,
};

use crate::auth::{Caller, MaybeCaller};
use crate::error::ApiError;
use crate::server::AppState;

const LIST_DEFAULT_LIMIT: i64 = 50;
const LIST_MAX_LIMIT: i64 = 500;

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Response body for `GET /requests/{request_id}`.
#[derive(Debug, Serialize)]
pub struct RequestDetail {
    pub request_id: String,
    pub template_id: String,
    pub total_created: i64,
    pub total_skipped: i64,
    pub created_at: String,
    pub status_counts: BTreeMap<String, i64>,
}

/// One row of `GET /messages`.
#[derive(Debug, Serialize)]
pub struct MessageView {
    pub message_id: String,
    pub request_id: String,
    pub to: String,
    pub status: String,
    pub priority: String,
    pub priority_weight: i64,
    pub schedule_at: Option<String>,
    pub lease_until: Option<String>,
    pub agent_id: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&SmsMessage> for MessageView {
    fn from(m: &SmsMessage) -> Self {
        Self {
            message_id: m.message_id.clone(),
            request_id: m.request_id.clone(),
            to: m.to.clone(),
            status: m.status.as_str().to_string(),
            priority: m.priority.as_str().to_string(),
            priority_weight: m.priority_weight,
            schedule_at: m.schedule_at.as_ref().map(format_timestamp),
            lease_until: m.lease_until.as_ref().map(format_timestamp),
            agent_id: m.agent_id.clone(),
            last_error: m.last_error.clone(),
            created_at: format_timestamp(&m.created_at),
            updated_at: format_timestamp(&m.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageList {
    pub items: Vec<MessageView>,
    pub count: usize,
}

/// Query string of `GET /messages`. Numbers arrive as text so a bad value
/// can be reported instead of silently dropped.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub request_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobsParams {
    pub limit: Option<String>,
}

/// Response body for `GET /agent/jobs/next`.
#[derive(Debug, Serialize)]
pub struct JobBatchResponse {
    pub batch_id: String,
    pub lease_seconds: i64,
    pub rate_limit_per_min: i64,
    pub messages: Vec<LeasedJob>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportBody {
    #[serde(default)]
    pub messages: Vec<ReportItem>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusOk {
    pub status: &'static str,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn require_sender(principal: &Principal) -> Result<&ApiKeyCaller, ApiError> {
    match principal.as_api_key() {
        Some(caller) if principal.can_send() => Ok(caller),
        _ => Err(ApiError::forbidden("sms:send scope required")),
    }
}

fn require_reader(principal: &Principal) -> Result<(), ApiError> {
    if principal.can_read() {
        Ok(())
    } else {
        Err(ApiError::forbidden("sms:read scope required"))
    }
}

fn require_agent(principal: &Principal) -> Result<&AgentCaller, ApiError> {
    principal
        .as_agent()
        .ok_or_else(|| ApiError::forbidden("agent token required"))
}

fn parse_number(value: Option<&str>) -> Result<Option<i64>, ()> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|_| ()),
    }
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus_render {
        Some(render) => (
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => ApiError::not_found("metrics disabled").into_response(),
    }
}

/// POST /requests
pub async fn create_request(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<IntakeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IntakeOutcome>), ApiError> {
    let caller = require_sender(&principal)?;
    let request = body(payload)?;
    let outcome = state.dispatcher.intake.submit(caller, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /requests/{request_id}
pub async fn get_request(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(request_id): Path<String>,
) -> Result<Json<RequestDetail>, ApiError> {
    require_reader(&principal)?;
    let Some(request) = state.storage.get_request(&request_id).await? else {
        return Err(ApiError::not_found("Request not found"));
    };
    if let Some(caller) = principal.as_api_key() {
        if caller.id != request.api_key_id {
            return Err(ApiError::forbidden("Not authorized"));
        }
    }
    let status_counts = state.storage.status_counts(&request_id).await?;
    Ok(Json(RequestDetail {
        request_id: request.request_id,
        template_id: request.template_id,
        total_created: request.total_created,
        total_skipped: request.total_skipped,
        created_at: format_timestamp(&request.created_at),
        status_counts,
    }))
}

/// GET /messages?request_id=&status=&limit=&skip=
pub async fn list_messages(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(params): Query<ListParams>,
) -> Result<Json<MessageList>, ApiError> {
    require_reader(&principal)?;
    let Some(request_id) = params.request_id.filter(|r| !r.is_empty()) else {
        return Err(ApiError::bad_request("request_id required"));
    };
    let (limit, skip) = match (
        parse_number(params.limit.as_deref()),
        parse_number(params.skip.as_deref()),
    ) {
        (Ok(limit), Ok(skip)) => (limit, skip),
        _ => return Err(ApiError::bad_request("limit/skip must be integers")),
    };
    let limit = match limit {
        Some(n) if n > 0 => n.min(LIST_MAX_LIMIT),
        _ => LIST_DEFAULT_LIMIT,
    };

    let query = MessageQuery {
        request_id,
        status: params.status.filter(|s| !s.is_empty()),
        api_key_id: principal.as_api_key().map(|c| c.id.clone()),
        limit,
        skip: skip.unwrap_or(0).max(0),
    };
    let items: Vec<MessageView> = state
        .storage
        .list_messages(&query)
        .await?
        .iter()
        .map(MessageView::from)
        .collect();
    Ok(Json(MessageList {
        count: items.len(),
        items,
    }))
}

/// POST /agent/register
///
/// Open to unauthenticated devices (guarded by the registration secret);
/// an authenticated agent only refreshes its profile.
pub async fn agent_register(
    State(state): State<AppState>,
    MaybeCaller(principal): MaybeCaller,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterOutcome>), ApiError> {
    let request = body(payload)?;
    let current = principal.as_ref().and_then(Principal::as_agent);
    let outcome = state.dispatcher.agents.register(current, request).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

/// POST /agent/heartbeat
pub async fn agent_heartbeat(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<Json<StatusOk>, ApiError> {
    let agent = require_agent(&principal)?;
    let request = body(payload)?;
    state.dispatcher.agents.heartbeat(agent, request).await?;
    Ok(Json(StatusOk { status: "ok" }))
}

/// GET /agent/jobs/next?limit=
pub async fn agent_jobs_next(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(params): Query<JobsParams>,
) -> Result<Json<JobBatchResponse>, ApiError> {
    let agent = require_agent(&principal)?;
    let requested = parse_number(params.limit.as_deref())
        .map_err(|_| ApiError::bad_request("limit must be an integer"))?
        .map(|n| usize::try_from(n).unwrap_or(0));
    let leases = &state.dispatcher.leases;
    let batch = leases
        .claim_batch(agent, leases.batch_limit(requested))
        .await?;
    Ok(Json(JobBatchResponse {
        batch_id: batch.batch_id,
        lease_seconds: batch.lease_seconds,
        rate_limit_per_min: batch.rate_limit_per_min,
        messages: batch.messages.iter().map(LeasedJob::from).collect(),
    }))
}

/// POST /agent/messages/report
pub async fn agent_report(
    State(state): State<AppState>,
    Caller(principal): Caller,
    payload: Result<Json<ReportBody>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let agent = require_agent(&principal)?;
    let report = body(payload)?;
    let updated = state.dispatcher.reports.apply(agent, report.messages).await?;
    Ok(Json(ReportResponse { updated }))
}
