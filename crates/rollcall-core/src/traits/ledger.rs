// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw transport to the external attendance ledger.
//!
//! A transport performs exactly one network exchange per call and reports
//! failures as a [`TransportError`]. Retry, backoff, and outcome decoding
//! belong to the ledger client, not to transports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{HealthStatus, LedgerRecord};

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum LedgerCall {
    #[serde(rename_all = "camelCase")]
    CreateSession {
        session_code: String,
        class_id: String,
        duration_secs: i64,
    },
    #[serde(rename_all = "camelCase")]
    MarkAttendance {
        session_code: String,
        student_id: String,
        class_id: String,
    },
    #[serde(rename_all = "camelCase")]
    RegisterStudent {
        student_id: String,
        student_address: String,
    },
}

impl LedgerCall {
    /// Contract function name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "createSession",
            Self::MarkAttendance { .. } => "markAttendance",
            Self::RegisterStudent { .. } => "registerStudent",
        }
    }
}

/// A read-only contract query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "camelCase")]
pub enum LedgerQuery {
    #[serde(rename_all = "camelCase")]
    IsSessionValid { session_code: String },
    #[serde(rename_all = "camelCase")]
    HasAttended {
        session_code: String,
        student_id: String,
    },
    #[serde(rename_all = "camelCase")]
    GetAttendanceRecord {
        session_code: String,
        student_id: String,
    },
    GetTotalRecords,
    GetRecordByIndex { index: u64 },
}

impl LedgerQuery {
    /// Contract function name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IsSessionValid { .. } => "isSessionValid",
            Self::HasAttended { .. } => "hasAttended",
            Self::GetAttendanceRecord { .. } => "getAttendanceRecord",
            Self::GetTotalRecords => "getTotalRecords",
            Self::GetRecordByIndex { .. } => "getRecordByIndex",
        }
    }
}

/// Value returned by a read-only query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum QueryValue {
    Bool(bool),
    Count(u64),
    Record(Option<LedgerRecord>),
}

/// Mined status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_height: u64,
    /// Block timestamp, Unix seconds.
    pub timestamp: i64,
    /// `None` on success, the revert message otherwise.
    #[serde(default)]
    pub revert: Option<String>,
}

/// Failure of a single transport exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, or similar. The request was not delivered.
    #[error("ledger node unreachable: {0}")]
    Unreachable(String),
    /// No response in time. The request may or may not have been delivered.
    #[error("ledger request timed out")]
    TimedOut,
    /// Node overloaded or failing (HTTP 429/5xx).
    #[error("ledger node busy: {0}")]
    Busy(String),
    /// Nonce or sequence number conflict.
    #[error("sequence conflict: {0}")]
    SequenceConflict(String),
    /// The contract reverted the call.
    #[error("reverted: {0}")]
    Reverted(String),
    /// The node answered with something unexpected.
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::TimedOut | Self::Busy(_))
    }

    /// True when the request may have reached the node despite the error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Busy(_))
    }
}

/// One-exchange transport to the ledger node.
#[async_trait]
pub trait LedgerTransport: Send + Sync + 'static {
    /// Broadcasts a state-changing call and returns its transaction hash.
    async fn send(&self, call: &LedgerCall) -> Result<String, TransportError>;

    /// Fetches the receipt of a transaction. `None` while still unmined.
    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, TransportError>;

    /// Executes a read-only query.
    async fn query(&self, query: &LedgerQuery) -> Result<QueryValue, TransportError>;

    /// Re-reads the signer's sequence number after a conflict.
    async fn refresh_sequence(&self) -> Result<(), TransportError>;

    async fn health_check(&self) -> HealthStatus;
}
