// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication adapter trait.

use async_trait::async_trait;

use crate::error::SmsGateError;
use crate::principal::{AuthToken, Principal};
use crate::traits::adapter::PluginAdapter;

/// Resolves a raw credential into the caller it identifies.
///
/// Returns [`SmsGateError::Unauthorized`] when the credential is present but
/// invalid (unknown key, inactive agent, bad signature, expired token).
#[async_trait]
pub trait AuthAdapter: PluginAdapter {
    async fn authenticate(&self, token: AuthToken) -> Result<Principal, SmsGateError>;
}
