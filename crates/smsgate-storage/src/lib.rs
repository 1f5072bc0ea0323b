// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the smsgate dispatch queue.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the typed queries behind the
//! job table: all-or-nothing intake writes, the atomic lease claim and
//! guarded status reports.

pub mod adapter;
pub mod database;
pub mod migrations;
pub(crate) mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
