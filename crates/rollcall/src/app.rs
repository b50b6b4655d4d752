// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the engine from configuration.

use std::sync::Arc;

use rollcall_config::RollcallConfig;
use rollcall_core::{AttendanceStore, Clock, EvidenceStore, RollcallError, SystemClock};
use rollcall_engine::{AttendanceRecorder, EvidencePinner, ReconciliationEngine, SessionManager};
use rollcall_ledger::{HttpLedgerTransport, IpfsEvidenceStore, LedgerClient};
use rollcall_storage::SqliteStore;

/// Every engine component, built over the configured cache and ledger node.
pub struct App {
    pub store: Arc<SqliteStore>,
    pub ledger: LedgerClient,
    pub sessions: Arc<SessionManager>,
    pub recorder: Arc<AttendanceRecorder>,
    pub reconciler: Arc<ReconciliationEngine>,
    /// Present when `[evidence] enabled = true`.
    pub evidence: Option<Arc<dyn EvidenceStore>>,
}

impl App {
    pub async fn open(config: &RollcallConfig) -> Result<Self, RollcallError> {
        let store = Arc::new(SqliteStore::open(&config.storage).await?);
        let transport = Arc::new(HttpLedgerTransport::new(&config.ledger)?);
        let ledger = LedgerClient::new(transport, &config.ledger);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let dyn_store: Arc<dyn AttendanceStore> = store.clone();

        let sessions = Arc::new(SessionManager::new(
            dyn_store.clone(),
            ledger.clone(),
            clock.clone(),
            config.engine.clone(),
            config.ledger.verify_sessions,
        ));
        let evidence: Option<Arc<dyn EvidenceStore>> = if config.evidence.enabled {
            Some(Arc::new(IpfsEvidenceStore::new(&config.evidence)?))
        } else {
            None
        };
        let pinner = evidence
            .clone()
            .map(|store| Arc::new(EvidencePinner::new(dyn_store.clone(), store, clock.clone())));

        let mut recorder = AttendanceRecorder::new(
            dyn_store.clone(),
            ledger.clone(),
            sessions.clone(),
            clock.clone(),
            config.engine.pending_policy,
        );
        let mut reconciler =
            ReconciliationEngine::new(dyn_store, ledger.clone(), clock, config.reconcile.clone());
        if let Some(pinner) = pinner {
            recorder = recorder.with_evidence(pinner.clone());
            reconciler = reconciler.with_evidence(pinner);
        }
        let recorder = Arc::new(recorder);
        let reconciler = Arc::new(reconciler);

        Ok(Self {
            store,
            ledger,
            sessions,
            recorder,
            reconciler,
            evidence,
        })
    }

    pub fn dyn_store(&self) -> Arc<dyn AttendanceStore> {
        self.store.clone()
    }

    /// Flushes the cache. Call before exit.
    pub async fn close(&self) -> Result<(), RollcallError> {
        self.store.close().await
    }
}
