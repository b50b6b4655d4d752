// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort evidence pinning for confirmed records.
//!
//! A pin failure never changes a record's state. Records left without a
//! CID are picked up again by the reconciliation backfill.

use std::sync::Arc;

use rollcall_core::{
    AttendanceRecord, AttendanceStore, Clock, EvidenceDocument, EvidenceStore, RecordState,
    RollcallError,
};
use tracing::{debug, warn};

/// Pins confirmed records and stores the returned CID on the row.
pub struct EvidencePinner {
    store: Arc<dyn AttendanceStore>,
    evidence: Arc<dyn EvidenceStore>,
    clock: Arc<dyn Clock>,
}

impl EvidencePinner {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        evidence: Arc<dyn EvidenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            evidence,
            clock,
        }
    }

    /// Pins `record` if it is confirmed and unpinned. Returns the stored CID.
    pub async fn pin(&self, record: &AttendanceRecord) -> Option<String> {
        match self.try_pin(record).await {
            Ok(cid) => cid,
            Err(e) => {
                warn!(
                    session_code = %record.session_code,
                    student_id = %record.student_id,
                    error = %e,
                    "evidence pin failed"
                );
                None
            }
        }
    }

    /// Pins up to `limit` confirmed records that have no evidence yet and
    /// returns how many were pinned. Stops at the first pin failure.
    pub async fn backfill(&self, limit: i64) -> Result<u64, RollcallError> {
        let mut pinned = 0;
        for record in self.store.missing_evidence(limit).await? {
            match self.try_pin(&record).await {
                Ok(Some(_)) => pinned += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, pinned, "evidence backfill stopped");
                    break;
                }
            }
        }
        Ok(pinned)
    }

    async fn try_pin(&self, record: &AttendanceRecord) -> Result<Option<String>, RollcallError> {
        if record.state != RecordState::Confirmed || record.evidence_cid.is_some() {
            return Ok(None);
        }
        let code = record.session_code.as_str();
        let student = record.student_id.as_str();

        let pinned = self.evidence.pin(&EvidenceDocument::for_record(record)).await;
        crate::metrics::record_evidence_pin(pinned.is_ok());
        let cid = pinned?;

        if self
            .store
            .set_evidence_cid(code, student, &cid, self.clock.now())
            .await?
        {
            debug!(session_code = code, student_id = student, cid = %cid, "evidence stored");
            Ok(Some(cid))
        } else {
            debug!(session_code = code, student_id = student, "record pinned elsewhere first");
            Ok(None)
        }
    }
}
