// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! binary installs a recorder.

use metrics::{describe_counter, describe_gauge, describe_histogram};

use crate::reconcile::ReconcileReport;

/// Registers metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!("rollcall_sessions_created_total", "Sessions issued");
    describe_counter!(
        "rollcall_marks_total",
        "Scan submissions by outcome label"
    );
    describe_histogram!(
        "rollcall_mark_duration_seconds",
        "Time to settle a scan submission"
    );
    describe_counter!(
        "rollcall_reconcile_records_total",
        "Records changed by reconciliation, by action"
    );
    describe_counter!(
        "rollcall_reconcile_conflicts_total",
        "Confirmed local records that disagree with the ledger"
    );
    describe_counter!("rollcall_reconcile_failures_total", "Aborted reconciliation passes");
    describe_counter!(
        "rollcall_evidence_pins_total",
        "Evidence pin attempts by result"
    );
    describe_gauge!(
        "rollcall_reconcile_cursor",
        "Ledger records imported so far"
    );
}

pub fn record_session_created() {
    metrics::counter!("rollcall_sessions_created_total").increment(1);
}

pub fn record_mark(outcome: &'static str, seconds: f64) {
    metrics::counter!("rollcall_marks_total", "outcome" => outcome).increment(1);
    metrics::histogram!("rollcall_mark_duration_seconds").record(seconds);
}

pub fn record_reconcile(report: &ReconcileReport) {
    for (action, count) in [
        ("imported", report.imported),
        ("promoted", report.promoted),
        ("rejected", report.rejected),
        ("resubmitted", report.resubmitted),
        ("pinned", report.pinned),
    ] {
        metrics::counter!("rollcall_reconcile_records_total", "action" => action).increment(count);
    }
    metrics::counter!("rollcall_reconcile_conflicts_total").increment(report.conflicts);
}

pub fn record_reconcile_failure() {
    metrics::counter!("rollcall_reconcile_failures_total").increment(1);
}

pub fn set_cursor(cursor: u64) {
    metrics::gauge!("rollcall_reconcile_cursor").set(cursor as f64);
}

pub fn record_evidence_pin(ok: bool) {
    let result = if ok { "ok" } else { "failed" };
    metrics::counter!("rollcall_evidence_pins_total", "result" => result).increment(1);
}
