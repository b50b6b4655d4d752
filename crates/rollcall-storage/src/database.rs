// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle: PRAGMA setup, migrations, WAL checkpoint on close.
//!
//! Every statement runs on tokio-rusqlite's single background thread, so
//! writes are serialized without any extra locking.

use std::path::Path;

use rollcall_core::RollcallError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Converts a tokio-rusqlite error into `RollcallError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RollcallError {
    RollcallError::storage(e)
}

/// Handle to the attendance cache database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode.
    pub async fn open(path: &str) -> Result<Self, RollcallError> {
        Self::open_with(path, true).await
    }

    /// Opens the database, migrating it to the latest schema first.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, RollcallError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(RollcallError::storage)?;
            }
        }

        // Migrations need a plain connection; run them off the async runtime.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), RollcallError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(RollcallError::storage)?;
            if wal_mode {
                let mode: String = conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                    .map_err(RollcallError::storage)?;
                debug!(journal_mode = %mode, "journal mode set");
            }
            run_migrations(&mut conn)
        })
        .await
        .map_err(|e| RollcallError::Internal(format!("migration task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(RollcallError::storage)?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.pragma_update(None, "busy_timeout", 5000)?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main file is self-contained.
    pub async fn close(&self) -> Result<(), RollcallError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}
