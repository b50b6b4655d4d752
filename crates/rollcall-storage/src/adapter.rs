// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`AttendanceStore`].

use async_trait::async_trait;
use tracing::debug;

use rollcall_config::StorageConfig;
use rollcall_core::{
    AttendanceRecord, AttendanceStore, FillOutcome, HealthStatus, RecordFilter, RecordState,
    RollcallError, Session,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed attendance cache.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the database named in the storage config.
    pub async fn open(config: &StorageConfig) -> Result<Self, RollcallError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store initialized");
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn count_by_state(&self) -> Result<Vec<(RecordState, u64)>, RollcallError> {
        queries::attendance::count_by_state(&self.db).await
    }

    pub async fn close(&self) -> Result<(), RollcallError> {
        self.db.close().await
    }
}

#[async_trait]
impl AttendanceStore for SqliteStore {
    async fn insert_session(&self, session: &Session) -> Result<(), RollcallError> {
        queries::sessions::insert_session(&self.db, session).await
    }

    async fn get_session(&self, session_code: &str) -> Result<Option<Session>, RollcallError> {
        queries::sessions::get_session(&self.db, session_code).await
    }

    async fn list_sessions(&self, class_id: Option<&str>) -> Result<Vec<Session>, RollcallError> {
        queries::sessions::list_sessions(&self.db, class_id).await
    }

    async fn get_record(
        &self,
        session_code: &str,
        student_id: &str,
    ) -> Result<Option<AttendanceRecord>, RollcallError> {
        queries::attendance::get_record(&self.db, session_code, student_id).await
    }

    async fn claim_provisional(&self, record: &AttendanceRecord) -> Result<bool, RollcallError> {
        queries::attendance::claim_provisional(&self.db, record).await
    }

    async fn record_submission(
        &self,
        session_code: &str,
        student_id: &str,
        tx_hash: Option<&str>,
        now: i64,
    ) -> Result<(), RollcallError> {
        queries::attendance::record_submission(&self.db, session_code, student_id, tx_hash, now)
            .await
    }

    async fn confirm(
        &self,
        session_code: &str,
        student_id: &str,
        tx_hash: Option<&str>,
        confirmed_at: i64,
        now: i64,
    ) -> Result<bool, RollcallError> {
        queries::attendance::confirm(&self.db, session_code, student_id, tx_hash, confirmed_at, now)
            .await
    }

    async fn reject(
        &self,
        session_code: &str,
        student_id: &str,
        reason: &str,
        now: i64,
    ) -> Result<bool, RollcallError> {
        queries::attendance::reject(&self.db, session_code, student_id, reason, now).await
    }

    async fn fill_confirmed(&self, record: &AttendanceRecord) -> Result<FillOutcome, RollcallError> {
        queries::attendance::fill_confirmed(&self.db, record).await
    }

    async fn set_evidence_cid(
        &self,
        session_code: &str,
        student_id: &str,
        cid: &str,
        now: i64,
    ) -> Result<bool, RollcallError> {
        queries::attendance::set_evidence_cid(&self.db, session_code, student_id, cid, now).await
    }

    async fn missing_evidence(&self, limit: i64) -> Result<Vec<AttendanceRecord>, RollcallError> {
        queries::attendance::missing_evidence(&self.db, limit).await
    }

    async fn stale_provisional(
        &self,
        older_than: i64,
        limit: i64,
    ) -> Result<Vec<AttendanceRecord>, RollcallError> {
        queries::attendance::stale_provisional(&self.db, older_than, limit).await
    }

    async fn list_records(&self, filter: &RecordFilter) -> Result<Vec<AttendanceRecord>, RollcallError> {
        queries::attendance::list_records(&self.db, filter).await
    }

    async fn reconcile_cursor(&self) -> Result<u64, RollcallError> {
        queries::cursor::get_cursor(&self.db).await
    }

    async fn set_reconcile_cursor(&self, cursor: u64) -> Result<(), RollcallError> {
        queries::cursor::set_cursor(&self.db, cursor).await
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        self.db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}
