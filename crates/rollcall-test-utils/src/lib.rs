// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Rollcall integration tests.
//!
//! Provides an in-memory ledger, a manual clock, and a harness that wires
//! the full engine over a temporary SQLite cache, so tests run fast and
//! deterministically without a ledger node.
//!
//! # Components
//!
//! - [`MockLedger`] - In-memory attendance contract with fault injection
//! - [`MockEvidence`] - In-memory evidence store with a failure switch
//! - [`ManualClock`] - Settable clock shared by the engine and the mock ledger
//! - [`TestHarness`] - Fully wired engine over a temp database

pub mod clock;
pub mod harness;
pub mod mock_evidence;
pub mod mock_ledger;

pub use clock::ManualClock;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_evidence::MockEvidence;
pub use mock_ledger::MockLedger;
