// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Query modules take `&Database` and run their SQL inside `connection().call()`.
//! Do NOT create additional Connection instances for writes: the lease claim
//! relies on statements never interleaving.

use std::path::{Path, PathBuf};

use smsgate_core::SmsGateError;
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into `SmsGateError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SmsGateError {
    SmsGateError::storage(e)
}

/// Handle to the SQLite database.
///
/// Cloning the inner connection is cheap; every clone talks to the same
/// background thread.
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database at `path` with WAL enabled and
    /// apply pending migrations.
    pub async fn open(path: &str) -> Result<Self, SmsGateError> {
        Self::open_with(path, true).await
    }

    /// Like [`Database::open`], choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, SmsGateError> {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(SmsGateError::storage)?;
        }

        // Schema setup runs on a plain blocking connection before the shared
        // writer thread exists.
        let setup_path = path.clone();
        tokio::task::spawn_blocking(move || prepare_schema(&setup_path, wal_mode))
            .await
            .map_err(|e| SmsGateError::Internal(format!("schema setup task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(SmsGateError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA synchronous = NORMAL;",
            )
        })
        .await
        .map_err(map_tr_err)?;

        info!(path = %path.display(), wal_mode, "database opened");
        Ok(Self { conn, path })
    }

    /// The shared connection. Every query goes through `call()` on it.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), SmsGateError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
            })
            .await
            .map_err(map_tr_err)?;
        self.conn.close().await.map_err(SmsGateError::storage)?;
        debug!(path = %self.path.display(), "database closed");
        Ok(())
    }
}

fn prepare_schema(path: &Path, wal_mode: bool) -> Result<(), SmsGateError> {
    let mut conn = rusqlite::Connection::open(path).map_err(SmsGateError::storage)?;
    let journal = if wal_mode { "WAL" } else { "DELETE" };
    let _mode: String = conn
        .query_row(&format!("PRAGMA journal_mode = {journal}"), [], |row| row.get(0))
        .map_err(SmsGateError::storage)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(SmsGateError::storage)?;
    migrations::run_migrations(&mut conn)
}
