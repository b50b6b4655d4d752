// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-addressed storage for confirmed attendance evidence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RollcallError;
use crate::types::AttendanceRecord;

/// Document kind written into every evidence document.
pub const EVIDENCE_KIND: &str = "attendance_record";

/// The JSON document pinned for a confirmed attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_code: String,
    pub class_id: String,
    pub student_id: String,
    pub student_address: Option<String>,
    /// Ledger confirmation time, falling back to the claim time.
    pub timestamp: i64,
    pub ledger_tx_hash: Option<String>,
    pub record_hash: String,
}

impl EvidenceDocument {
    pub fn for_record(record: &AttendanceRecord) -> Self {
        Self {
            kind: EVIDENCE_KIND.to_string(),
            session_code: record.session_code.clone(),
            class_id: record.class_id.clone(),
            student_id: record.student_id.clone(),
            student_address: record.student_address.clone(),
            timestamp: record.confirmed_at.unwrap_or(record.claimed_at),
            ledger_tx_hash: record.ledger_tx_hash.clone(),
            record_hash: record.record_hash.clone(),
        }
    }
}

/// Pins evidence documents and reads them back by content identifier.
///
/// Pinning is best effort. Callers never let an evidence failure change the
/// state of an attendance record.
#[async_trait]
pub trait EvidenceStore: Send + Sync + 'static {
    /// Pins `document` and returns its content identifier.
    async fn pin(&self, document: &EvidenceDocument) -> Result<String, RollcallError>;

    /// Reads a pinned document. `Ok(None)` when no gateway has it.
    async fn fetch(&self, cid: &str) -> Result<Option<EvidenceDocument>, RollcallError>;
}
