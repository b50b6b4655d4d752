// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` wires a [`SessionManager`], an [`AttendanceRecorder`] and a
//! [`ReconciliationEngine`] over a temp SQLite cache, a [`MockLedger`], and a
//! [`ManualClock`].

use std::sync::Arc;
use std::time::Duration;

use rollcall_config::{
    EngineConfig, LedgerConfig, PendingPolicy, ReconcileConfig, RollcallConfig, StorageConfig,
};
use rollcall_core::{AttendanceStore, MarkOutcome, RollcallError, Session};
use rollcall_engine::{
    AttendanceRecorder, EvidencePinner, ReconcileReport, ReconciliationEngine, SessionManager,
};
use rollcall_ledger::{LedgerClient, RetryPolicy};
use rollcall_storage::SqliteStore;

use crate::clock::ManualClock;
use crate::mock_evidence::MockEvidence;
use crate::mock_ledger::MockLedger;

/// Start time of every harness clock.
pub const EPOCH: i64 = 1_700_000_000;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    pending_policy: PendingPolicy,
    verify_sessions: bool,
    max_attempts: u32,
    max_resubmits: u32,
    provisional_timeout_secs: i64,
    confirmation_timeout: Duration,
    batch_size: u32,
    evidence: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            pending_policy: PendingPolicy::Report,
            verify_sessions: true,
            max_attempts: 3,
            max_resubmits: 1,
            provisional_timeout_secs: 120,
            confirmation_timeout: Duration::from_millis(100),
            batch_size: 500,
            evidence: false,
        }
    }

    pub fn with_pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = policy;
        self
    }

    /// Disable the ledger `isSessionValid` check on scans.
    pub fn without_session_verification(mut self) -> Self {
        self.verify_sessions = false;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_max_resubmits(mut self, resubmits: u32) -> Self {
        self.max_resubmits = resubmits;
        self
    }

    pub fn with_provisional_timeout(mut self, secs: i64) -> Self {
        self.provisional_timeout_secs = secs;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Pin evidence for confirmed records into a [`MockEvidence`].
    pub fn with_evidence(mut self) -> Self {
        self.evidence = true;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, RollcallError> {
        let temp_dir = tempfile::TempDir::new().map_err(RollcallError::storage)?;
        let storage_config = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteStore::open(&storage_config).await?);

        let clock = Arc::new(ManualClock::new(EPOCH));
        let ledger = Arc::new(MockLedger::new(clock.clone()));
        let client = LedgerClient::with_policy(
            ledger.clone(),
            RetryPolicy::immediate(self.max_attempts),
            self.confirmation_timeout,
            Duration::from_millis(5),
        );

        let config = RollcallConfig {
            storage: storage_config,
            ledger: LedgerConfig {
                max_attempts: self.max_attempts,
                confirmation_timeout_ms: self.confirmation_timeout.as_millis() as u64,
                poll_interval_ms: 5,
                verify_sessions: self.verify_sessions,
                ..LedgerConfig::default()
            },
            engine: EngineConfig {
                pending_policy: self.pending_policy,
                ..EngineConfig::default()
            },
            reconcile: ReconcileConfig {
                interval_secs: 1,
                provisional_timeout_secs: self.provisional_timeout_secs,
                max_resubmits: self.max_resubmits,
                batch_size: self.batch_size,
                ..ReconcileConfig::default()
            },
            ..RollcallConfig::default()
        };

        let dyn_store: Arc<dyn AttendanceStore> = store.clone();
        let sessions = Arc::new(SessionManager::new(
            dyn_store.clone(),
            client.clone(),
            clock.clone(),
            config.engine.clone(),
            self.verify_sessions,
        ));
        let evidence = Arc::new(MockEvidence::new());
        let mut recorder = AttendanceRecorder::new(
            dyn_store.clone(),
            client.clone(),
            sessions.clone(),
            clock.clone(),
            self.pending_policy,
        );
        let mut reconciler = ReconciliationEngine::new(
            dyn_store.clone(),
            client.clone(),
            clock.clone(),
            config.reconcile.clone(),
        );
        if self.evidence {
            let pinner = Arc::new(EvidencePinner::new(dyn_store, evidence.clone(), clock.clone()));
            recorder = recorder.with_evidence(pinner.clone());
            reconciler = reconciler.with_evidence(pinner);
        }
        let recorder = Arc::new(recorder);
        let reconciler = Arc::new(reconciler);

        Ok(TestHarness {
            store,
            ledger,
            clock,
            client,
            sessions,
            recorder,
            reconciler,
            evidence,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine over a temp cache and an in-memory ledger.
pub struct TestHarness {
    /// SQLite cache (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    pub ledger: Arc<MockLedger>,
    pub clock: Arc<ManualClock>,
    pub client: LedgerClient,
    pub sessions: Arc<SessionManager>,
    pub recorder: Arc<AttendanceRecorder>,
    pub reconciler: Arc<ReconciliationEngine>,
    /// Only wired into the engine when built `with_evidence()`.
    pub evidence: Arc<MockEvidence>,
    pub config: RollcallConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default options.
    pub async fn new() -> Result<Self, RollcallError> {
        Self::builder().build().await
    }

    /// Issues a session for `class_id` lasting `secs`.
    pub async fn session(&self, class_id: &str, secs: i64) -> Result<Session, RollcallError> {
        self.sessions.create_session(class_id, Some(secs)).await
    }

    /// Scans `session`'s own token as `student_id`.
    pub async fn scan(&self, session: &Session, student_id: &str) -> Result<MarkOutcome, RollcallError> {
        self.recorder
            .mark_attendance(&session.token().to_string(), student_id)
            .await
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport, RollcallError> {
        self.reconciler.reconcile_once().await
    }
}
