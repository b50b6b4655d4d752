// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Rollcall attendance engine.
//!
//! This crate provides the error type, domain types, QR token codec, and
//! the trait seams (local cache, ledger transport, clock) shared by every
//! other crate in the workspace.

pub mod clock;
pub mod error;
pub mod token;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock};
pub use error::RollcallError;
pub use token::{QrToken, TokenError};
pub use traits::{
    AttendanceStore, EvidenceDocument, EvidenceStore, LedgerCall, LedgerQuery, LedgerTransport,
    QueryValue, TransportError, TxReceipt,
};
pub use types::{
    AttendanceRecord, FillOutcome, HealthStatus, LedgerRecord, MarkOutcome, RecordFilter,
    RecordState, RevertReason, Session, SessionStatus,
};
