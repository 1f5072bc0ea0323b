// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for smsgate integration tests.
//!
//! Provides a [`TestHarness`] that wires the whole stack (temp SQLite,
//! dispatch services, authenticator chain, router) for fast, deterministic
//! tests that drive the HTTP API without binding a socket.

pub mod harness;

pub use harness::{Auth, TestHarness, TestHarnessBuilder};
