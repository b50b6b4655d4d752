// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scan handling: turns a QR token and a student id into one settled mark.
//!
//! The provisional claim in the local cache is the only mutual exclusion.
//! No lock is held while waiting on the ledger.

use std::sync::Arc;
use std::time::Instant;

use rollcall_config::PendingPolicy;
use rollcall_core::{
    AttendanceRecord, AttendanceStore, Clock, LedgerCall, MarkOutcome, QrToken, RecordState,
    RollcallError,
};
use rollcall_ledger::{LedgerClient, SubmissionOutcome};
use tracing::{debug, info, warn};

use crate::evidence::EvidencePinner;
use crate::session::{SessionCheck, SessionManager};

/// Records attendance marks against the cache and the ledger.
pub struct AttendanceRecorder {
    store: Arc<dyn AttendanceStore>,
    ledger: LedgerClient,
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    pending_policy: PendingPolicy,
    evidence: Option<Arc<EvidencePinner>>,
}

impl AttendanceRecorder {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        ledger: LedgerClient,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        pending_policy: PendingPolicy,
    ) -> Self {
        Self {
            store,
            ledger,
            sessions,
            clock,
            pending_policy,
            evidence: None,
        }
    }

    /// Pins evidence for every mark this recorder confirms.
    pub fn with_evidence(mut self, pinner: Arc<EvidencePinner>) -> Self {
        self.evidence = Some(pinner);
        self
    }

    /// Settles one scan.
    ///
    /// Business outcomes come back as `Ok(MarkOutcome)`. Infrastructure
    /// failures (ledger unreachable after retries, storage) are `Err`.
    pub async fn mark_attendance(
        &self,
        token: &str,
        student_id: &str,
    ) -> Result<MarkOutcome, RollcallError> {
        let started = Instant::now();
        let result = self.mark(token, student_id.trim()).await;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(RollcallError::LedgerUnavailable { .. }) => "ledger_unavailable",
            Err(_) => "error",
        };
        crate::metrics::record_mark(label, started.elapsed().as_secs_f64());
        result
    }

    async fn mark(&self, raw_token: &str, student_id: &str) -> Result<MarkOutcome, RollcallError> {
        if student_id.is_empty() {
            return Ok(MarkOutcome::Invalid("student id must not be empty".into()));
        }
        let token = match QrToken::parse(raw_token.trim()) {
            Ok(token) => token,
            Err(e) => {
                debug!(error = %e, "rejecting malformed token");
                return Ok(MarkOutcome::Invalid(e.to_string()));
            }
        };

        if token.is_expired(self.clock.now()) {
            debug!(session_code = %token.session_code, "token past expiry");
            return Ok(MarkOutcome::Expired);
        }

        if let Some(existing) = self.store.get_record(&token.session_code, student_id).await? {
            if existing.state != RecordState::Rejected {
                return Ok(MarkOutcome::AlreadyRecorded(existing));
            }
        }

        let session = match self.sessions.check(&token.session_code).await? {
            SessionCheck::Unknown => {
                return Ok(MarkOutcome::Invalid(format!(
                    "unknown session `{}`",
                    token.session_code
                )));
            }
            SessionCheck::Expired(_) => return Ok(MarkOutcome::Expired),
            SessionCheck::Valid(session) => session,
        };
        if session.class_id != token.class_id {
            warn!(
                session_code = %session.session_code,
                token_class = %token.class_id,
                session_class = %session.class_id,
                "token class does not match session"
            );
            return Ok(MarkOutcome::Invalid("token class does not match session".into()));
        }

        if self.ledger.has_attended(&session.session_code, student_id).await? {
            info!(
                session_code = %session.session_code,
                student_id,
                "mark already on ledger, healing local cache"
            );
            let record = self
                .adopt_ledger_record(&session.session_code, student_id)
                .await?;
            return Ok(MarkOutcome::AlreadyRecorded(record));
        }

        let claim = AttendanceRecord::provisional(
            &session.session_code,
            student_id,
            &session.class_id,
            self.clock.now(),
        );
        if !self.store.claim_provisional(&claim).await? {
            debug!(session_code = %session.session_code, student_id, "concurrent claim won");
            let existing = self.load(&session.session_code, student_id).await?;
            return Ok(MarkOutcome::AlreadyRecorded(existing));
        }

        self.submit(claim).await
    }

    /// Sends `markAttendance` for a freshly claimed record and settles it.
    async fn submit(&self, claim: AttendanceRecord) -> Result<MarkOutcome, RollcallError> {
        let code = claim.session_code.as_str();
        let student = claim.student_id.as_str();
        let call = LedgerCall::MarkAttendance {
            session_code: claim.session_code.clone(),
            student_id: claim.student_id.clone(),
            class_id: claim.class_id.clone(),
        };

        let submitted = match SubmissionOutcome::from_submit(self.ledger.submit(&call).await) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session_code = code, student_id = student, error = %e, "markAttendance failed");
                self.store
                    .reject(code, student, &e.to_string(), self.clock.now())
                    .await?;
                return Err(e);
            }
        };
        let pending_tx = match &submitted {
            SubmissionOutcome::Pending { tx_hash } => Some(tx_hash.as_str()),
            _ => None,
        };
        self.store
            .record_submission(code, student, pending_tx, self.clock.now())
            .await?;

        let outcome = match submitted {
            SubmissionOutcome::Pending { tx_hash } => {
                match self.ledger.await_confirmation(&tx_hash).await {
                    Ok(confirmation) => SubmissionOutcome::from_confirmation(&tx_hash, confirmation),
                    Err(e) => {
                        warn!(tx_hash = %tx_hash, error = %e, "receipt unreadable, leaving mark pending");
                        SubmissionOutcome::Pending { tx_hash }
                    }
                }
            }
            other => other,
        };

        let settled = self.settle(&claim, outcome).await?;
        self.attach_evidence(settled).await
    }

    async fn attach_evidence(&self, outcome: MarkOutcome) -> Result<MarkOutcome, RollcallError> {
        let Some(pinner) = &self.evidence else {
            return Ok(outcome);
        };
        match outcome {
            MarkOutcome::Recorded(record) => {
                if pinner.pin(&record).await.is_none() {
                    return Ok(MarkOutcome::Recorded(record));
                }
                let pinned = self.load(&record.session_code, &record.student_id).await?;
                Ok(MarkOutcome::Recorded(pinned))
            }
            other => Ok(other),
        }
    }

    async fn settle(
        &self,
        claim: &AttendanceRecord,
        outcome: SubmissionOutcome,
    ) -> Result<MarkOutcome, RollcallError> {
        let code = claim.session_code.as_str();
        let student = claim.student_id.as_str();
        match outcome {
            SubmissionOutcome::Confirmed(Some(tx)) => {
                self.store
                    .confirm(code, student, Some(&tx.tx_hash), tx.timestamp, self.clock.now())
                    .await?;
                info!(session_code = code, student_id = student, tx_hash = %tx.tx_hash, "attendance recorded");
                Ok(MarkOutcome::Recorded(self.load(code, student).await?))
            }
            SubmissionOutcome::Confirmed(None) => {
                let record = self.adopt_ledger_record(code, student).await?;
                info!(session_code = code, student_id = student, "retried submission landed");
                Ok(MarkOutcome::Recorded(record))
            }
            SubmissionOutcome::AlreadyRecorded => {
                let record = self.adopt_ledger_record(code, student).await?;
                Ok(MarkOutcome::AlreadyRecorded(record))
            }
            SubmissionOutcome::Pending { tx_hash } => {
                info!(session_code = code, student_id = student, tx_hash = %tx_hash, "confirmation pending");
                self.pending(code, student).await
            }
            // The call may have landed. The record stays provisional for
            // reconciliation, which checks the ledger before resubmitting.
            SubmissionOutcome::Unknown(detail) => {
                warn!(session_code = code, student_id = student, detail = %detail, "markAttendance outcome unknown");
                self.pending(code, student).await
            }
            SubmissionOutcome::Rejected(reason) => {
                warn!(session_code = code, student_id = student, reason = %reason, "ledger rejected mark");
                self.store
                    .reject(code, student, &reason.to_string(), self.clock.now())
                    .await?;
                Ok(MarkOutcome::Rejected(reason.to_string()))
            }
            SubmissionOutcome::Unavailable(message) => {
                warn!(session_code = code, student_id = student, detail = %message, "ledger unavailable");
                self.store
                    .reject(
                        code,
                        student,
                        &format!("ledger unavailable: {message}"),
                        self.clock.now(),
                    )
                    .await?;
                Err(RollcallError::LedgerUnavailable { message })
            }
        }
    }

    async fn pending(&self, session_code: &str, student_id: &str) -> Result<MarkOutcome, RollcallError> {
        let record = self.load(session_code, student_id).await?;
        Ok(match self.pending_policy {
            PendingPolicy::Optimistic => MarkOutcome::Recorded(record),
            PendingPolicy::Report => MarkOutcome::ConfirmationPending(record),
        })
    }

    /// Writes the ledger's copy of a mark into the cache and returns the
    /// cached record. The ledger's data wins over any local row.
    async fn adopt_ledger_record(
        &self,
        session_code: &str,
        student_id: &str,
    ) -> Result<AttendanceRecord, RollcallError> {
        let Some(entry) = self.ledger.attendance_record(session_code, student_id).await? else {
            return Err(RollcallError::Ledger {
                message: format!(
                    "ledger reports {session_code}/{student_id} attended but returned no record"
                ),
                source: None,
            });
        };
        let outcome = self
            .store
            .fill_confirmed(&AttendanceRecord::from_ledger(&entry, self.clock.now()))
            .await?;
        debug!(session_code, student_id, ?outcome, "ledger record adopted");
        self.load(session_code, student_id).await
    }

    async fn load(&self, session_code: &str, student_id: &str) -> Result<AttendanceRecord, RollcallError> {
        self.store
            .get_record(session_code, student_id)
            .await?
            .ok_or_else(|| RollcallError::NotFound(format!("attendance {session_code}/{student_id}")))
    }
}
