// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the storage, ledger, and engine crates.
//!
//! All timestamps are Unix seconds (UTC), matching the QR token wire format
//! and the ledger's block timestamps.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

use crate::token::QrToken;

/// An attendance window for one class meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, unguessable identifier. Immutable once issued.
    pub session_code: String,
    pub class_id: String,
    pub issued_at: i64,
    pub duration_secs: i64,
    /// Always `issued_at + duration_secs`.
    pub expires_at: i64,
    /// Hash of the `createSession` transaction, if the ledger returned one.
    pub ledger_tx_hash: Option<String>,
}

impl Session {
    /// Builds a session, deriving `expires_at` from the issue time and duration.
    pub fn new(
        session_code: String,
        class_id: String,
        issued_at: i64,
        duration_secs: i64,
    ) -> Self {
        Self {
            session_code,
            class_id,
            issued_at,
            duration_secs,
            expires_at: issued_at.saturating_add(duration_secs),
            ledger_tx_hash: None,
        }
    }

    /// Local status at `now`. Never persisted.
    pub fn status(&self, now: i64) -> SessionStatus {
        if now < self.expires_at {
            SessionStatus::Active
        } else {
            SessionStatus::Expired
        }
    }

    /// The QR token students scan for this session.
    pub fn token(&self) -> QrToken {
        QrToken {
            class_id: self.class_id.clone(),
            session_code: self.session_code.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Derived session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Expired,
}

/// Lifecycle state of a locally cached attendance record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// Claimed locally; ledger outcome not yet known.
    Provisional,
    /// Ledger-confirmed. Terminal.
    Confirmed,
    /// Ledger refused the mark or reconciliation gave up. Re-claimable.
    Rejected,
}

/// A locally cached attendance mark, keyed by `(session_code, student_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub session_code: String,
    pub student_id: String,
    pub class_id: String,
    pub student_address: Option<String>,
    /// Client-observed time of the scan.
    pub claimed_at: i64,
    /// Ledger-confirmed time.
    pub confirmed_at: Option<i64>,
    pub ledger_tx_hash: Option<String>,
    pub state: RecordState,
    /// Hash of the last submitted transaction that has not confirmed yet.
    pub pending_tx: Option<String>,
    pub submit_attempts: u32,
    pub reject_reason: Option<String>,
    /// SHA-256 fingerprint of the identifying fields.
    pub record_hash: String,
    /// Content identifier of the pinned evidence document, once pinned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_cid: Option<String>,
    pub updated_at: i64,
}

impl AttendanceRecord {
    /// A fresh provisional claim made at `now`.
    pub fn provisional(
        session_code: &str,
        student_id: &str,
        class_id: &str,
        now: i64,
    ) -> Self {
        Self {
            session_code: session_code.to_string(),
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            student_address: None,
            claimed_at: now,
            confirmed_at: None,
            ledger_tx_hash: None,
            state: RecordState::Provisional,
            pending_tx: None,
            submit_attempts: 0,
            reject_reason: None,
            record_hash: record_hash(session_code, class_id, student_id, now),
            evidence_cid: None,
            updated_at: now,
        }
    }

    /// A confirmed record built from a ledger entry.
    pub fn from_ledger(entry: &LedgerRecord, now: i64) -> Self {
        Self {
            session_code: entry.session_code.clone(),
            student_id: entry.student_id.clone(),
            class_id: entry.class_id.clone(),
            student_address: entry.student_address.clone(),
            claimed_at: entry.timestamp,
            confirmed_at: Some(entry.timestamp),
            ledger_tx_hash: entry.tx_hash.clone(),
            state: RecordState::Confirmed,
            pending_tx: None,
            submit_attempts: 0,
            reject_reason: None,
            record_hash: record_hash(
                &entry.session_code,
                &entry.class_id,
                &entry.student_id,
                entry.timestamp,
            ),
            evidence_cid: None,
            updated_at: now,
        }
    }

    /// True only once the ledger has confirmed the mark.
    pub fn verified(&self) -> bool {
        self.state == RecordState::Confirmed
    }
}

/// Content fingerprint of a record, hex-encoded SHA-256.
pub fn record_hash(session_code: &str, class_id: &str, student_id: &str, claimed_at: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_code.as_bytes());
    hasher.update(b"|");
    hasher.update(class_id.as_bytes());
    hasher.update(b"|");
    hasher.update(student_id.as_bytes());
    hasher.update(b"|");
    hasher.update(claimed_at.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// An attendance entry as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub session_code: String,
    pub class_id: String,
    pub student_id: String,
    #[serde(default)]
    pub student_address: Option<String>,
    /// Block timestamp of the mark.
    pub timestamp: i64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// Why the ledger refused a state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevertReason {
    AlreadyAttended,
    SessionInvalid,
    Unauthorized,
    StudentNotRegistered,
    Other(String),
}

impl RevertReason {
    /// Classifies a raw revert message from the contract.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("already attended")
            || lower.contains("already marked")
            || lower.contains("already recorded")
        {
            Self::AlreadyAttended
        } else if lower.contains("session") && (lower.contains("invalid") || lower.contains("expired"))
        {
            Self::SessionInvalid
        } else if lower.contains("not authorized") || lower.contains("unauthorized") {
            Self::Unauthorized
        } else if lower.contains("not registered") {
            Self::StudentNotRegistered
        } else {
            Self::Other(message.to_string())
        }
    }
}

impl std::fmt::Display for RevertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyAttended => f.write_str("attendance already recorded"),
            Self::SessionInvalid => f.write_str("session is invalid or expired"),
            Self::Unauthorized => f.write_str("submitter not authorized"),
            Self::StudentNotRegistered => f.write_str("student not registered"),
            Self::Other(msg) => f.write_str(msg),
        }
    }
}

/// Result of a scan submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The mark is ledger-confirmed (or accepted pending confirmation under
    /// the optimistic policy).
    Recorded(AttendanceRecord),
    /// A mark already existed locally or on the ledger. Not an error.
    AlreadyRecorded(AttendanceRecord),
    /// The token or its session is past expiry.
    Expired,
    /// Malformed token or unknown session.
    Invalid(String),
    /// Submitted; the ledger has not confirmed within the timeout.
    ConfirmationPending(AttendanceRecord),
    /// The ledger permanently refused the mark.
    Rejected(String),
}

impl MarkOutcome {
    /// Stable label used in logs, metrics, and HTTP bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Recorded(_) => "recorded",
            Self::AlreadyRecorded(_) => "already_recorded",
            Self::Expired => "expired",
            Self::Invalid(_) => "invalid",
            Self::ConfirmationPending(_) => "pending",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Result of writing a ledger-sourced confirmed record into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// No local row existed; a confirmed one was inserted.
    Inserted,
    /// A provisional or rejected row was promoted to confirmed.
    Promoted,
    /// Already confirmed with the same (or unknown) transaction.
    AlreadyConfirmed,
    /// Already confirmed with a different transaction hash. Left untouched.
    Conflict { existing_tx: Option<String> },
}

/// Filter for listing cached records.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub session_code: Option<String>,
    pub class_id: Option<String>,
    pub student_id: Option<String>,
    pub state: Option<RecordState>,
    pub limit: Option<i64>,
}

/// Health status reported by component health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}
