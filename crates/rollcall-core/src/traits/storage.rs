// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local cache trait for sessions and attendance records.

use async_trait::async_trait;

use crate::error::RollcallError;
use crate::types::{AttendanceRecord, FillOutcome, HealthStatus, RecordFilter, Session};

/// Persistence primitives for the local attendance cache.
///
/// The uniqueness constraint on `(session_code, student_id)` is the only
/// mutual exclusion in the engine. Every state transition below is a single
/// conditional write, so implementations must make each call atomic.
#[async_trait]
pub trait AttendanceStore: Send + Sync + 'static {
    /// Stores a newly issued session. Fails if the code already exists.
    async fn insert_session(&self, session: &Session) -> Result<(), RollcallError>;

    async fn get_session(&self, session_code: &str) -> Result<Option<Session>, RollcallError>;

    /// Lists sessions, newest first, optionally for a single class.
    async fn list_sessions(&self, class_id: Option<&str>) -> Result<Vec<Session>, RollcallError>;

    async fn get_record(
        &self,
        session_code: &str,
        student_id: &str,
    ) -> Result<Option<AttendanceRecord>, RollcallError>;

    /// Claims the key with a provisional record.
    ///
    /// Returns `false` when a provisional or confirmed record already holds
    /// the key. A rejected record is replaced by the new claim.
    async fn claim_provisional(&self, record: &AttendanceRecord) -> Result<bool, RollcallError>;

    /// Attaches the hash of a submitted transaction to a provisional record
    /// and bumps its submission counter.
    async fn record_submission(
        &self,
        session_code: &str,
        student_id: &str,
        tx_hash: Option<&str>,
        now: i64,
    ) -> Result<(), RollcallError>;

    /// Provisional -> Confirmed. Returns `false` if the record was not provisional.
    async fn confirm(
        &self,
        session_code: &str,
        student_id: &str,
        tx_hash: Option<&str>,
        confirmed_at: i64,
        now: i64,
    ) -> Result<bool, RollcallError>;

    /// Provisional -> Rejected. Returns `false` if the record was not provisional.
    async fn reject(
        &self,
        session_code: &str,
        student_id: &str,
        reason: &str,
        now: i64,
    ) -> Result<bool, RollcallError>;

    /// Writes a ledger-sourced confirmed record, filling gaps only.
    ///
    /// Never overwrites a confirmed record that carries a different
    /// transaction hash.
    async fn fill_confirmed(&self, record: &AttendanceRecord) -> Result<FillOutcome, RollcallError>;

    /// Stores the evidence identifier on a confirmed record.
    ///
    /// Returns `false` if the record is not confirmed or already has one.
    async fn set_evidence_cid(
        &self,
        session_code: &str,
        student_id: &str,
        cid: &str,
        now: i64,
    ) -> Result<bool, RollcallError>;

    /// Confirmed records with no pinned evidence, oldest confirmation first.
    async fn missing_evidence(&self, limit: i64) -> Result<Vec<AttendanceRecord>, RollcallError>;

    /// Provisional records last touched at or before `older_than`, oldest first.
    async fn stale_provisional(
        &self,
        older_than: i64,
        limit: i64,
    ) -> Result<Vec<AttendanceRecord>, RollcallError>;

    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, RollcallError>;

    /// Number of ledger records already reconciled.
    async fn reconcile_cursor(&self) -> Result<u64, RollcallError>;

    async fn set_reconcile_cursor(&self, cursor: u64) -> Result<(), RollcallError>;

    async fn health_check(&self) -> Result<HealthStatus, RollcallError>;
}
