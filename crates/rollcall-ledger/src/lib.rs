// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger access for the Rollcall engine.
//!
//! [`LedgerClient`] layers retry, sequence-conflict recovery, and bounded
//! confirmation waits over any [`LedgerTransport`](rollcall_core::LedgerTransport).
//! [`HttpLedgerTransport`] is the production transport, and
//! [`IpfsEvidenceStore`] pins evidence for confirmed records.

pub mod client;
pub mod evidence;
pub mod http;
pub mod outcome;
pub mod retry;

pub use client::{Confirmation, ConfirmedTx, LedgerClient, Submitted};
pub use evidence::IpfsEvidenceStore;
pub use http::HttpLedgerTransport;
pub use outcome::SubmissionOutcome;
pub use retry::RetryPolicy;
