// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rollcall doctor` command implementation.
//!
//! Runs diagnostic checks against the cache, the ledger node, the
//! reconciliation backlog, and the evidence pinning backlog.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use rollcall_config::RollcallConfig;
use rollcall_core::{AttendanceStore, HealthStatus, LedgerTransport, RecordState, RollcallError};
use rollcall_ledger::HttpLedgerTransport;
use rollcall_storage::SqliteStore;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Runs every check and prints a report. Failed checks are reported, not
/// returned as errors.
pub async fn run_doctor(config: &RollcallConfig, plain: bool) -> Result<(), RollcallError> {
    let use_color = !plain && std::io::stdout().is_terminal();

    let results = vec![
        check_database(config).await,
        check_ledger(config).await,
        check_backlog(config).await,
        check_evidence(config).await,
    ];

    println!();
    println!("  rollcall doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in &results {
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{}", format_line(result, use_color));
    }
    println!();
    if issues > 0 {
        let word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {word} found.");
    } else {
        println!("  All checks passed.");
    }
    println!();
    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!("    {tag} {:<20} {} ({duration_ms}ms)", result.name, result.message)
    }
}

async fn check_database(config: &RollcallConfig) -> CheckResult {
    let start = Instant::now();
    let path = &config.storage.database_path;
    if !std::path::Path::new(path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {path} (will be created on first run)"),
            start,
        );
    }
    match SqliteStore::open(&config.storage).await {
        Ok(store) => {
            let _ = store.close().await;
            CheckResult::new("Database", CheckStatus::Pass, "connected, migrations current", start)
        }
        Err(e) => CheckResult::new("Database", CheckStatus::Fail, e.to_string(), start),
    }
}

async fn check_ledger(config: &RollcallConfig) -> CheckResult {
    let start = Instant::now();
    let transport = match HttpLedgerTransport::new(&config.ledger) {
        Ok(t) => t,
        Err(e) => return CheckResult::new("Ledger node", CheckStatus::Fail, e.to_string(), start),
    };
    match transport.health_check().await {
        HealthStatus::Healthy => CheckResult::new(
            "Ledger node",
            CheckStatus::Pass,
            format!("reachable at {}", config.ledger.endpoint),
            start,
        ),
        HealthStatus::Degraded(reason) => CheckResult::new("Ledger node", CheckStatus::Warn, reason, start),
        HealthStatus::Unhealthy(reason) => CheckResult::new("Ledger node", CheckStatus::Fail, reason, start),
    }
}

/// Warns while provisional records are waiting on the ledger.
async fn check_backlog(config: &RollcallConfig) -> CheckResult {
    let start = Instant::now();
    if !std::path::Path::new(&config.storage.database_path).exists() {
        return CheckResult::new("Pending marks", CheckStatus::Pass, "no cache yet", start);
    }
    let store = match SqliteStore::open(&config.storage).await {
        Ok(store) => store,
        Err(e) => return CheckResult::new("Pending marks", CheckStatus::Fail, e.to_string(), start),
    };
    let counts = store.count_by_state().await;
    let _ = store.close().await;
    match counts {
        Ok(counts) => {
            let provisional = counts
                .iter()
                .find(|(state, _)| *state == RecordState::Provisional)
                .map_or(0, |(_, n)| *n);
            let summary = counts
                .iter()
                .map(|(state, n)| format!("{state}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            let status = if provisional > 0 {
                CheckStatus::Warn
            } else {
                CheckStatus::Pass
            };
            let message = if summary.is_empty() {
                "no records".to_string()
            } else {
                summary
            };
            CheckResult::new("Pending marks", status, message, start)
        }
        Err(e) => CheckResult::new("Pending marks", CheckStatus::Fail, e.to_string(), start),
    }
}

/// Warns while confirmed records are waiting for an evidence CID.
async fn check_evidence(config: &RollcallConfig) -> CheckResult {
    let start = Instant::now();
    if !config.evidence.enabled {
        return CheckResult::new("Evidence", CheckStatus::Pass, "pinning disabled", start);
    }
    if !std::path::Path::new(&config.storage.database_path).exists() {
        return CheckResult::new("Evidence", CheckStatus::Pass, "no cache yet", start);
    }
    let store = match SqliteStore::open(&config.storage).await {
        Ok(store) => store,
        Err(e) => return CheckResult::new("Evidence", CheckStatus::Fail, e.to_string(), start),
    };
    let unpinned = store.missing_evidence(i64::from(config.reconcile.batch_size)).await;
    let _ = store.close().await;
    match unpinned {
        Ok(records) if records.is_empty() => {
            CheckResult::new("Evidence", CheckStatus::Pass, "every confirmed record pinned", start)
        }
        Ok(records) => CheckResult::new(
            "Evidence",
            CheckStatus::Warn,
            format!("{} confirmed record(s) not pinned yet", records.len()),
            start,
        ),
        Err(e) => CheckResult::new("Evidence", CheckStatus::Fail, e.to_string(), start),
    }
}
