// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the engine and its collaborators.
//!
//! The engine reaches the local cache only through [`AttendanceStore`] and
//! the ledger only through [`LedgerTransport`] (wrapped by the ledger client).
//! Evidence pinning goes through [`EvidenceStore`].

pub mod evidence;
pub mod ledger;
pub mod storage;

pub use evidence::{EVIDENCE_KIND, EvidenceDocument, EvidenceStore};
pub use ledger::{LedgerCall, LedgerQuery, LedgerTransport, QueryValue, TransportError, TxReceipt};
pub use storage::AttendanceStore;
