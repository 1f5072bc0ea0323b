// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`SmsGateError`] to HTTP responses.
//!
//! Every handler returns `Result<_, ApiError>`; this is the only place that
//! decides status codes. The body is always `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use smsgate_core::SmsGateError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<SmsGateError> for ApiError {
    fn from(err: SmsGateError) -> Self {
        match err {
            SmsGateError::Validation(message) => Self::bad_request(message),
            e @ SmsGateError::TemplateNotApproved { .. } => Self::bad_request(e.to_string()),
            SmsGateError::Unauthorized(message) => Self::unauthorized(message),
            SmsGateError::Forbidden(message) => Self::forbidden(message),
            e @ SmsGateError::NotFound { .. } => Self::not_found(e.to_string()),
            e @ SmsGateError::RateLimited { .. } => {
                tracing::info!(error = %e, "intake rejected by daily quota");
                Self::new(StatusCode::TOO_MANY_REQUESTS, "Daily rate limit exceeded")
            }
            e => {
                tracing::error!(error = %e, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (SmsGateError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                SmsGateError::TemplateNotApproved {
                    template_id: "t1".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (SmsGateError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
            (SmsGateError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (
                SmsGateError::NotFound {
                    kind: "request",
                    id: "r1".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                SmsGateError::RateLimited {
                    usage: 7,
                    requested: 5,
                    limit: 10,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (SmsGateError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ApiError::from(SmsGateError::storage(std::io::Error::other("disk full")));
        assert_eq!(err.message(), "internal server error");
    }

    #[test]
    fn client_messages_pass_through() {
        let err = ApiError::from(SmsGateError::Validation("Missing variable CODE".into()));
        assert_eq!(err.message(), "Missing variable CODE");
    }
}
