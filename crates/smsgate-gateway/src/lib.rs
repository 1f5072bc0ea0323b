// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/JSON API for the smsgate dispatch queue.
//!
//! Client systems submit send requests and read their progress; agent
//! devices register, heartbeat, claim leased jobs and report results. Every
//! request is resolved to a [`smsgate_core::Principal`] once by the
//! authenticator chain before it reaches a handler.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{Authenticator, JwtVerifier};
pub use error::ApiError;
pub use server::{AppState, build_router, normalize_base_path, start_server};
