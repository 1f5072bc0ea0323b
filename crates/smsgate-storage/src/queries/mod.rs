// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table. Each function takes `&Database` and runs a
//! single closure on the shared connection.

pub mod agents;
pub mod api_keys;
pub mod app_config;
pub mod audit;
pub mod lease;
pub mod messages;
pub mod requests;
pub mod templates;

#[cfg(test)]
pub(crate) mod test_support;
