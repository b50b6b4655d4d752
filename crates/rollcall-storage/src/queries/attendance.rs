// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attendance record state transitions.
//!
//! Every transition is a single conditional statement (or one immediate
//! transaction), so concurrent callers racing on the same key see exactly
//! one winner.

use std::str::FromStr;

use rollcall_core::{AttendanceRecord, FillOutcome, RecordFilter, RecordState, RollcallError};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "session_code, student_id, class_id, student_address, claimed_at, \
     confirmed_at, ledger_tx_hash, state, pending_tx, submit_attempts, reject_reason, \
     record_hash, updated_at, evidence_cid";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let state: String = row.get(7)?;
    let state = RecordState::from_str(&state)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    Ok(AttendanceRecord {
        session_code: row.get(0)?,
        student_id: row.get(1)?,
        class_id: row.get(2)?,
        student_address: row.get(3)?,
        claimed_at: row.get(4)?,
        confirmed_at: row.get(5)?,
        ledger_tx_hash: row.get(6)?,
        state,
        pending_tx: row.get(8)?,
        submit_attempts: row.get(9)?,
        reject_reason: row.get(10)?,
        record_hash: row.get(11)?,
        updated_at: row.get(12)?,
        evidence_cid: row.get(13)?,
    })
}

pub async fn get_record(
    db: &Database,
    session_code: &str,
    student_id: &str,
) -> Result<Option<AttendanceRecord>, RollcallError> {
    let (session_code, student_id) = (session_code.to_string(), student_id.to_string());
    db.connection()
        .call(move |conn| -> Result<Option<AttendanceRecord>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM attendance WHERE session_code = ?1 AND student_id = ?2"
                ),
                params![session_code, student_id],
                row_to_record,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Claims the key for a provisional record.
///
/// Inserts when the key is free and replaces a rejected row. A provisional
/// or confirmed row leaves the statement a no-op, reported as `false`.
pub async fn claim_provisional(
    db: &Database,
    record: &AttendanceRecord,
) -> Result<bool, RollcallError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "INSERT INTO attendance (session_code, student_id, class_id, student_address,
                     claimed_at, confirmed_at, ledger_tx_hash, state, pending_tx,
                     submit_attempts, reject_reason, record_hash, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, 'provisional', NULL, 0, NULL, ?6, ?7)
                 ON CONFLICT (session_code, student_id) DO UPDATE SET
                     class_id = excluded.class_id,
                     student_address = excluded.student_address,
                     claimed_at = excluded.claimed_at,
                     confirmed_at = NULL,
                     ledger_tx_hash = NULL,
                     state = 'provisional',
                     pending_tx = NULL,
                     submit_attempts = 0,
                     reject_reason = NULL,
                     record_hash = excluded.record_hash,
                     updated_at = excluded.updated_at,
                     evidence_cid = NULL
                 WHERE attendance.state = 'rejected'",
                params![
                    r.session_code,
                    r.student_id,
                    r.class_id,
                    r.student_address,
                    r.claimed_at,
                    r.record_hash,
                    r.updated_at,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Notes a submission attempt on a provisional record.
///
/// A `None` hash keeps whatever pending hash was already stored.
pub async fn record_submission(
    db: &Database,
    session_code: &str,
    student_id: &str,
    tx_hash: Option<&str>,
    now: i64,
) -> Result<(), RollcallError> {
    let (session_code, student_id) = (session_code.to_string(), student_id.to_string());
    let tx_hash = tx_hash.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "UPDATE attendance
                 SET pending_tx = COALESCE(?3, pending_tx),
                     submit_attempts = submit_attempts + 1,
                     updated_at = ?4
                 WHERE session_code = ?1 AND student_id = ?2 AND state = 'provisional'",
                params![session_code, student_id, tx_hash, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Provisional -> Confirmed. Falls back to the pending hash when `tx_hash` is `None`.
pub async fn confirm(
    db: &Database,
    session_code: &str,
    student_id: &str,
    tx_hash: Option<&str>,
    confirmed_at: i64,
    now: i64,
) -> Result<bool, RollcallError> {
    let (session_code, student_id) = (session_code.to_string(), student_id.to_string());
    let tx_hash = tx_hash.map(str::to_string);
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE attendance
                 SET state = 'confirmed',
                     confirmed_at = ?4,
                     ledger_tx_hash = COALESCE(?3, pending_tx),
                     pending_tx = NULL,
                     reject_reason = NULL,
                     updated_at = ?5
                 WHERE session_code = ?1 AND student_id = ?2 AND state = 'provisional'",
                params![session_code, student_id, tx_hash, confirmed_at, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Provisional -> Rejected. The pending hash is kept for diagnosis.
pub async fn reject(
    db: &Database,
    session_code: &str,
    student_id: &str,
    reason: &str,
    now: i64,
) -> Result<bool, RollcallError> {
    let (session_code, student_id) = (session_code.to_string(), student_id.to_string());
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE attendance
                 SET state = 'rejected', reject_reason = ?3, updated_at = ?4
                 WHERE session_code = ?1 AND student_id = ?2 AND state = 'provisional'",
                params![session_code, student_id, reason, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Writes a ledger-sourced record without ever overwriting confirmed data.
///
/// Missing rows are inserted, provisional and rejected rows are promoted,
/// and confirmed rows only have empty columns filled in.
pub async fn fill_confirmed(
    db: &Database,
    record: &AttendanceRecord,
) -> Result<FillOutcome, RollcallError> {
    let r = record.clone();
    db.connection()
        .call(move |conn| -> Result<FillOutcome, rusqlite::Error> {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing: Option<(String, Option<String>)> = tx
                .query_row(
                    "SELECT state, ledger_tx_hash FROM attendance
                     WHERE session_code = ?1 AND student_id = ?2",
                    params![r.session_code, r.student_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let outcome = match existing {
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO attendance ({COLUMNS})
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'confirmed', NULL, ?8, NULL, ?9, ?10, NULL)"
                        ),
                        params![
                            r.session_code,
                            r.student_id,
                            r.class_id,
                            r.student_address,
                            r.claimed_at,
                            r.confirmed_at,
                            r.ledger_tx_hash,
                            r.submit_attempts,
                            r.record_hash,
                            r.updated_at,
                        ],
                    )?;
                    FillOutcome::Inserted
                }
                Some((state, _)) if state != RecordState::Confirmed.to_string() => {
                    tx.execute(
                        "UPDATE attendance
                         SET state = 'confirmed',
                             confirmed_at = ?3,
                             ledger_tx_hash = COALESCE(?4, pending_tx, ledger_tx_hash),
                             student_address = COALESCE(?5, student_address),
                             pending_tx = NULL,
                             reject_reason = NULL,
                             updated_at = ?6
                         WHERE session_code = ?1 AND student_id = ?2",
                        params![
                            r.session_code,
                            r.student_id,
                            r.confirmed_at,
                            r.ledger_tx_hash,
                            r.student_address,
                            r.updated_at,
                        ],
                    )?;
                    FillOutcome::Promoted
                }
                Some((_, Some(existing_tx)))
                    if r.ledger_tx_hash.as_ref().is_some_and(|new| *new != existing_tx) =>
                {
                    FillOutcome::Conflict {
                        existing_tx: Some(existing_tx),
                    }
                }
                Some(_) => {
                    tx.execute(
                        "UPDATE attendance
                         SET ledger_tx_hash = COALESCE(ledger_tx_hash, ?3),
                             student_address = COALESCE(student_address, ?4),
                             confirmed_at = COALESCE(confirmed_at, ?5)
                         WHERE session_code = ?1 AND student_id = ?2",
                        params![
                            r.session_code,
                            r.student_id,
                            r.ledger_tx_hash,
                            r.student_address,
                            r.confirmed_at,
                        ],
                    )?;
                    FillOutcome::AlreadyConfirmed
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Stores the evidence identifier on a confirmed row that has none yet.
pub async fn set_evidence_cid(
    db: &Database,
    session_code: &str,
    student_id: &str,
    cid: &str,
    now: i64,
) -> Result<bool, RollcallError> {
    let (session_code, student_id) = (session_code.to_string(), student_id.to_string());
    let cid = cid.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE attendance
                 SET evidence_cid = ?3, updated_at = ?4
                 WHERE session_code = ?1 AND student_id = ?2
                   AND state = 'confirmed' AND evidence_cid IS NULL",
                params![session_code, student_id, cid, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Confirmed rows without pinned evidence, oldest confirmation first.
pub async fn missing_evidence(
    db: &Database,
    limit: i64,
) -> Result<Vec<AttendanceRecord>, RollcallError> {
    db.connection()
        .call(move |conn| -> Result<Vec<AttendanceRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM attendance
                 WHERE state = 'confirmed' AND evidence_cid IS NULL
                 ORDER BY confirmed_at ASC, session_code, student_id
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_record)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Provisional rows untouched since `older_than`, oldest first.
pub async fn stale_provisional(
    db: &Database,
    older_than: i64,
    limit: i64,
) -> Result<Vec<AttendanceRecord>, RollcallError> {
    db.connection()
        .call(move |conn| -> Result<Vec<AttendanceRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM attendance
                 WHERE state = 'provisional' AND updated_at <= ?1
                 ORDER BY updated_at ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![older_than, limit], row_to_record)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_records(
    db: &Database,
    filter: &RecordFilter,
) -> Result<Vec<AttendanceRecord>, RollcallError> {
    let session_code = filter.session_code.clone();
    let class_id = filter.class_id.clone();
    let student_id = filter.student_id.clone();
    let state = filter.state.map(|s| s.to_string());
    // SQLite treats a negative LIMIT as unbounded.
    let limit = filter.limit.unwrap_or(-1);
    db.connection()
        .call(move |conn| -> Result<Vec<AttendanceRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM attendance
                 WHERE (?1 IS NULL OR session_code = ?1)
                   AND (?2 IS NULL OR class_id = ?2)
                   AND (?3 IS NULL OR student_id = ?3)
                   AND (?4 IS NULL OR state = ?4)
                 ORDER BY claimed_at ASC, session_code, student_id
                 LIMIT ?5"
            ))?;
            let rows = stmt.query_map(
                params![session_code, class_id, student_id, state, limit],
                row_to_record,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Row counts per state, for health reporting.
pub async fn count_by_state(db: &Database) -> Result<Vec<(RecordState, u64)>, RollcallError> {
    db.connection()
        .call(|conn| -> Result<Vec<(RecordState, u64)>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT state, COUNT(*) FROM attendance GROUP BY state ORDER BY state")?;
            let rows = stmt.query_map([], |row| {
                let state: String = row.get(0)?;
                let state = RecordState::from_str(&state).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e))
                })?;
                Ok((state, row.get::<_, i64>(1)?.unsigned_abs()))
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
