// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation cursor: how many ledger records have been imported.

use rollcall_core::RollcallError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

pub async fn get_cursor(db: &Database) -> Result<u64, RollcallError> {
    let raw = db
        .connection()
        .call(|conn| -> Result<i64, rusqlite::Error> {
            conn.query_row(
                "SELECT next_index FROM reconcile_cursor WHERE id = 1",
                [],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    u64::try_from(raw)
        .map_err(|_| RollcallError::Internal(format!("negative reconcile cursor {raw}")))
}

pub async fn set_cursor(db: &Database, cursor: u64) -> Result<(), RollcallError> {
    let cursor = i64::try_from(cursor)
        .map_err(|_| RollcallError::InvalidInput(format!("cursor {cursor} out of range")))?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO reconcile_cursor (id, next_index) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET next_index = excluded.next_index",
                params![cursor],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
