// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The attendance consistency engine.
//!
//! [`SessionManager`] issues sessions, [`AttendanceRecorder`] settles scans,
//! and [`ReconciliationEngine`] keeps the local cache in agreement with the
//! ledger in the background. [`EvidencePinner`] optionally pins a document
//! for each confirmed record.

pub mod evidence;
pub mod metrics;
pub mod reconcile;
pub mod recorder;
pub mod session;

pub use evidence::EvidencePinner;
pub use reconcile::{RECONCILIATION_TIMED_OUT, ReconcileReport, ReconciliationEngine};
pub use recorder::AttendanceRecorder;
pub use session::{SessionCheck, SessionManager, generate_session_code};
