// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background repair of the local cache against the ledger.
//!
//! Each pass imports ledger records past the persisted cursor, then settles
//! provisional records that have been waiting longer than the configured
//! timeout. The ledger always wins; a confirmed local record that disagrees
//! with it is reported and left alone. With evidence pinning enabled, a
//! pass ends by pinning confirmed records that have no CID yet.

use std::sync::Arc;
use std::time::Duration;

use rollcall_config::ReconcileConfig;
use rollcall_core::{
    AttendanceRecord, AttendanceStore, Clock, FillOutcome, LedgerCall, RevertReason,
    RollcallError,
};
use rollcall_ledger::{LedgerClient, SubmissionOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::evidence::EvidencePinner;

/// Reject reason for provisional records that never settled.
pub const RECONCILIATION_TIMED_OUT: &str = "ReconciliationTimedOut";

/// What a single pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Ledger records written into the cache where no local row existed.
    pub imported: u64,
    /// Provisional or rejected rows moved to confirmed.
    pub promoted: u64,
    pub rejected: u64,
    pub resubmitted: u64,
    /// Confirmed rows whose transaction hash disagrees with the ledger.
    pub conflicts: u64,
    /// Confirmed rows that received an evidence CID.
    pub pinned: u64,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Periodic cache/ledger reconciliation.
pub struct ReconciliationEngine {
    store: Arc<dyn AttendanceStore>,
    ledger: LedgerClient,
    clock: Arc<dyn Clock>,
    config: ReconcileConfig,
    evidence: Option<Arc<EvidencePinner>>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        ledger: LedgerClient,
        clock: Arc<dyn Clock>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            config,
            evidence: None,
        }
    }

    /// Pins evidence for confirmed records that are still missing it.
    pub fn with_evidence(mut self, pinner: Arc<EvidencePinner>) -> Self {
        self.evidence = Some(pinner);
        self
    }

    /// Runs passes every `interval_secs` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the first immediate tick.
        interval.tick().await;

        info!(interval_secs = self.config.interval_secs, "reconciliation loop started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.reconcile_once().await {
                        Ok(report) if report.is_empty() => debug!("reconciliation pass: nothing to do"),
                        Ok(report) => info!(?report, "reconciliation pass complete"),
                        Err(e) => {
                            crate::metrics::record_reconcile_failure();
                            warn!(error = %e, "reconciliation pass aborted (non-fatal)");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("reconciliation loop shutting down");
                    break;
                }
            }
        }
    }

    /// One full pass. Ledger unavailability aborts the pass; work already
    /// applied stays applied and the cursor reflects it.
    pub async fn reconcile_once(&self) -> Result<ReconcileReport, RollcallError> {
        let mut report = ReconcileReport::default();
        let result: Result<(), RollcallError> = async {
            self.import_ledger_records(&mut report).await?;
            self.settle_stale_provisional(&mut report).await?;
            if let Some(pinner) = &self.evidence {
                report.pinned = pinner.backfill(i64::from(self.config.batch_size)).await?;
            }
            Ok(())
        }
        .await;
        crate::metrics::record_reconcile(&report);
        result.map(|()| report)
    }

    async fn import_ledger_records(&self, report: &mut ReconcileReport) -> Result<(), RollcallError> {
        let total = self.ledger.total_records().await?;
        let cursor = self.store.reconcile_cursor().await?;
        if cursor > total {
            warn!(cursor, total, "ledger reports fewer records than already reconciled");
            return Ok(());
        }
        let end = total.min(cursor.saturating_add(u64::from(self.config.batch_size)));

        for index in cursor..end {
            let Some(entry) = self.ledger.record_by_index(index).await? else {
                return Err(RollcallError::Ledger {
                    message: format!("ledger record {index} of {total} is missing"),
                    source: None,
                });
            };
            let record = AttendanceRecord::from_ledger(&entry, self.clock.now());
            match self.store.fill_confirmed(&record).await? {
                FillOutcome::Inserted => report.imported += 1,
                FillOutcome::Promoted => report.promoted += 1,
                FillOutcome::AlreadyConfirmed => {}
                FillOutcome::Conflict { existing_tx } => {
                    report.conflicts += 1;
                    error!(
                        session_code = %entry.session_code,
                        student_id = %entry.student_id,
                        local_tx = ?existing_tx,
                        ledger_tx = ?entry.tx_hash,
                        "confirmed record disagrees with ledger; left untouched"
                    );
                }
            }
            self.store.set_reconcile_cursor(index + 1).await?;
            crate::metrics::set_cursor(index + 1);
        }
        Ok(())
    }

    async fn settle_stale_provisional(&self, report: &mut ReconcileReport) -> Result<(), RollcallError> {
        let older_than = self.clock.now() - self.config.provisional_timeout_secs;
        let stale = self
            .store
            .stale_provisional(older_than, i64::from(self.config.batch_size))
            .await?;

        for record in stale {
            self.settle(&record, report).await?;
        }
        Ok(())
    }

    async fn settle(
        &self,
        record: &AttendanceRecord,
        report: &mut ReconcileReport,
    ) -> Result<(), RollcallError> {
        let code = record.session_code.as_str();
        let student = record.student_id.as_str();

        if self.ledger.has_attended(code, student).await? {
            return self.adopt(code, student, report).await;
        }

        if let Some(tx_hash) = record.pending_tx.as_deref() {
            if let Some(receipt) = self.ledger.receipt(tx_hash).await? {
                match receipt.revert {
                    Some(message) => {
                        let reason = RevertReason::classify(&message);
                        return self.reject(record, &reason.to_string(), report).await;
                    }
                    None => {
                        if self
                            .store
                            .confirm(code, student, Some(tx_hash), receipt.timestamp, self.clock.now())
                            .await?
                        {
                            report.promoted += 1;
                        }
                        return Ok(());
                    }
                }
            }
        }

        if record.submit_attempts > self.config.max_resubmits {
            return self.reject(record, RECONCILIATION_TIMED_OUT, report).await;
        }

        let call = LedgerCall::MarkAttendance {
            session_code: record.session_code.clone(),
            student_id: record.student_id.clone(),
            class_id: record.class_id.clone(),
        };
        match SubmissionOutcome::from_submit(self.ledger.submit(&call).await)? {
            SubmissionOutcome::Pending { tx_hash } => {
                self.store
                    .record_submission(code, student, Some(&tx_hash), self.clock.now())
                    .await?;
                report.resubmitted += 1;
                info!(session_code = code, student_id = student, tx_hash = %tx_hash, "stale mark resubmitted");
                Ok(())
            }
            SubmissionOutcome::Unknown(detail) => {
                self.store
                    .record_submission(code, student, None, self.clock.now())
                    .await?;
                report.resubmitted += 1;
                warn!(session_code = code, student_id = student, detail = %detail, "resubmission outcome unknown");
                Ok(())
            }
            SubmissionOutcome::Confirmed(_) | SubmissionOutcome::AlreadyRecorded => {
                self.adopt(code, student, report).await
            }
            SubmissionOutcome::Rejected(reason) => {
                self.reject(record, &reason.to_string(), report).await
            }
            SubmissionOutcome::Unavailable(message) => Err(RollcallError::LedgerUnavailable { message }),
        }
    }

    async fn adopt(
        &self,
        session_code: &str,
        student_id: &str,
        report: &mut ReconcileReport,
    ) -> Result<(), RollcallError> {
        let Some(entry) = self.ledger.attendance_record(session_code, student_id).await? else {
            return Err(RollcallError::Ledger {
                message: format!(
                    "ledger reports {session_code}/{student_id} attended but returned no record"
                ),
                source: None,
            });
        };
        let record = AttendanceRecord::from_ledger(&entry, self.clock.now());
        match self.store.fill_confirmed(&record).await? {
            FillOutcome::Promoted => report.promoted += 1,
            FillOutcome::Inserted => report.imported += 1,
            FillOutcome::AlreadyConfirmed => {}
            FillOutcome::Conflict { existing_tx } => {
                report.conflicts += 1;
                error!(session_code, student_id, local_tx = ?existing_tx, "confirmed record disagrees with ledger");
            }
        }
        Ok(())
    }

    async fn reject(
        &self,
        record: &AttendanceRecord,
        reason: &str,
        report: &mut ReconcileReport,
    ) -> Result<(), RollcallError> {
        if self
            .store
            .reject(&record.session_code, &record.student_id, reason, self.clock.now())
            .await?
        {
            report.rejected += 1;
            warn!(
                session_code = %record.session_code,
                student_id = %record.student_id,
                attempts = record.submit_attempts,
                reason,
                "provisional mark rejected"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report() {
        assert!(ReconcileReport::default().is_empty());
        let report = ReconcileReport {
            conflicts: 1,
            ..Default::default()
        };
        assert!(!report.is_empty());
    }
}
