// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session persistence.

use rollcall_core::{RollcallError, Session};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};
use crate::queries::is_constraint_violation;

const COLUMNS: &str =
    "session_code, class_id, issued_at, duration_secs, expires_at, ledger_tx_hash";

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_code: row.get(0)?,
        class_id: row.get(1)?,
        issued_at: row.get(2)?,
        duration_secs: row.get(3)?,
        expires_at: row.get(4)?,
        ledger_tx_hash: row.get(5)?,
    })
}

/// Inserts a session. A duplicate code is reported as invalid input.
pub async fn insert_session(db: &Database, session: &Session) -> Result<(), RollcallError> {
    let session = session.clone();
    let code = session.session_code.clone();
    let inserted = db
        .connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let result = conn.execute(
                &format!("INSERT INTO sessions ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![
                    session.session_code,
                    session.class_id,
                    session.issued_at,
                    session.duration_secs,
                    session.expires_at,
                    session.ledger_tx_hash,
                ],
            );
            match result {
                Ok(_) => Ok(true),
                Err(e) if is_constraint_violation(&e) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    if inserted {
        Ok(())
    } else {
        Err(RollcallError::InvalidInput(format!(
            "session code `{code}` already exists"
        )))
    }
}

pub async fn get_session(db: &Database, session_code: &str) -> Result<Option<Session>, RollcallError> {
    let session_code = session_code.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Session>, rusqlite::Error> {
            let result = conn.query_row(
                &format!("SELECT {COLUMNS} FROM sessions WHERE session_code = ?1"),
                params![session_code],
                row_to_session,
            );
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Newest first, optionally restricted to one class.
pub async fn list_sessions(
    db: &Database,
    class_id: Option<&str>,
) -> Result<Vec<Session>, RollcallError> {
    let class_id = class_id.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<Vec<Session>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM sessions
                 WHERE (?1 IS NULL OR class_id = ?1)
                 ORDER BY issued_at DESC, session_code"
            ))?;
            let rows = stmt.query_map(params![class_id], row_to_session)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
