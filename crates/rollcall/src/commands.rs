// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot CLI commands: sessions, scans, records, student registration.

use std::process::ExitCode;

use qrcode::QrCode;
use qrcode::render::unicode;
use rollcall_config::RollcallConfig;
use rollcall_core::{
    AttendanceStore, MarkOutcome, RecordFilter, RecordState, RollcallError, Session,
};
use rollcall_ledger::SubmissionOutcome;

use crate::app::App;

fn format_time(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Renders `token` as a terminal QR code.
pub fn render_qr(token: &str) -> Result<String, RollcallError> {
    let code = QrCode::new(token.as_bytes())
        .map_err(|e| RollcallError::Internal(format!("cannot encode QR token: {e}")))?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

fn print_session(app: &App, session: &Session) {
    println!("session   {}", session.session_code);
    println!("class     {}", session.class_id);
    println!("expires   {} ({})", format_time(session.expires_at), app.sessions.status(session));
    if let Some(tx) = &session.ledger_tx_hash {
        println!("ledger tx {tx}");
    }
    println!("token     {}", session.token());
}

pub async fn session_create(
    config: RollcallConfig,
    class_id: &str,
    duration_secs: Option<i64>,
    qr: bool,
) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    let session = app.sessions.create_session(class_id, duration_secs).await?;
    print_session(&app, &session);
    if qr {
        println!();
        println!("{}", render_qr(&session.token().to_string())?);
    }
    app.close().await?;
    Ok(ExitCode::SUCCESS)
}

pub async fn session_show(config: RollcallConfig, code: &str) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    let Some(session) = app.sessions.get_session(code).await? else {
        return Err(RollcallError::NotFound(format!("session `{code}`")));
    };
    print_session(&app, &session);
    println!("valid     {}", app.sessions.is_valid(code).await?);
    app.close().await?;
    Ok(ExitCode::SUCCESS)
}

pub async fn session_list(config: RollcallConfig, class_id: Option<&str>) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    for session in app.sessions.list_sessions(class_id).await? {
        println!(
            "{}  {:<12} {}  {}",
            session.session_code,
            session.class_id,
            format_time(session.expires_at),
            app.sessions.status(&session)
        );
    }
    app.close().await?;
    Ok(ExitCode::SUCCESS)
}

/// Exit code for a scan: 0 when the mark is (or already was) recorded,
/// 2 when the scan was refused, 3 while confirmation is pending.
pub fn mark_exit_status(outcome: &MarkOutcome) -> u8 {
    match outcome {
        MarkOutcome::Recorded(_) | MarkOutcome::AlreadyRecorded(_) => 0,
        MarkOutcome::ConfirmationPending(_) => 3,
        MarkOutcome::Expired | MarkOutcome::Invalid(_) | MarkOutcome::Rejected(_) => 2,
    }
}

pub async fn mark(config: RollcallConfig, token: &str, student_id: &str) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    let outcome = app.recorder.mark_attendance(token, student_id).await;
    app.close().await?;
    let outcome = outcome?;

    match &outcome {
        MarkOutcome::Recorded(r) | MarkOutcome::AlreadyRecorded(r) | MarkOutcome::ConfirmationPending(r) => {
            println!(
                "{}: {} in session {} ({}{})",
                outcome.label(),
                r.student_id,
                r.session_code,
                r.state,
                r.ledger_tx_hash
                    .as_deref()
                    .map(|tx| format!(", tx {tx}"))
                    .unwrap_or_default()
            );
            if let Some(cid) = &r.evidence_cid {
                println!("evidence: {cid}");
            }
        }
        MarkOutcome::Invalid(reason) | MarkOutcome::Rejected(reason) => {
            println!("{}: {reason}", outcome.label());
        }
        MarkOutcome::Expired => println!("expired: session has expired"),
    }
    Ok(ExitCode::from(mark_exit_status(&outcome)))
}

pub struct RecordsArgs {
    pub session_code: Option<String>,
    pub class_id: Option<String>,
    pub student_id: Option<String>,
    pub state: Option<RecordState>,
    pub limit: Option<i64>,
    pub json: bool,
}

pub async fn records(config: RollcallConfig, args: RecordsArgs) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    let filter = RecordFilter {
        session_code: args.session_code,
        class_id: args.class_id,
        student_id: args.student_id,
        state: args.state,
        limit: args.limit,
    };
    let records = app.store.list_records(&filter).await?;
    app.close().await?;

    if args.json {
        let out = serde_json::to_string_pretty(&records)
            .map_err(|e| RollcallError::Internal(format!("cannot serialize records: {e}")))?;
        println!("{out}");
        return Ok(ExitCode::SUCCESS);
    }
    for r in &records {
        println!(
            "{}  {:<12} {:<12} {:<11} {}",
            r.session_code,
            r.class_id,
            r.student_id,
            r.state.to_string(),
            format_time(r.confirmed_at.unwrap_or(r.claimed_at))
        );
    }
    println!("{} record(s)", records.len());
    Ok(ExitCode::SUCCESS)
}

/// Prints the evidence CID of one record and, with pinning enabled, the
/// document read back from the gateways.
pub async fn evidence(
    config: RollcallConfig,
    session_code: &str,
    student_id: &str,
) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    let result = show_evidence(&app, session_code, student_id).await;
    app.close().await?;
    result
}

async fn show_evidence(
    app: &App,
    session_code: &str,
    student_id: &str,
) -> Result<ExitCode, RollcallError> {
    let Some(record) = app.store.get_record(session_code, student_id).await? else {
        return Err(RollcallError::NotFound(format!(
            "attendance {session_code}/{student_id}"
        )));
    };
    let Some(cid) = record.evidence_cid else {
        println!(
            "no evidence pinned for {student_id} in session {session_code} ({})",
            record.state
        );
        return Ok(ExitCode::from(3));
    };
    println!("cid {cid}");
    let Some(store) = &app.evidence else {
        return Ok(ExitCode::SUCCESS);
    };
    match store.fetch(&cid).await? {
        Some(document) => {
            let out = serde_json::to_string_pretty(&document)
                .map_err(|e| RollcallError::Internal(format!("cannot serialize evidence: {e}")))?;
            println!("{out}");
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("no configured gateway serves {cid}");
            Ok(ExitCode::from(3))
        }
    }
}

pub async fn register_student(
    config: RollcallConfig,
    student_id: &str,
    address: &str,
) -> Result<ExitCode, RollcallError> {
    let app = App::open(&config).await?;
    let outcome = app.ledger.register_student(student_id, address).await;
    app.close().await?;

    match outcome? {
        SubmissionOutcome::Confirmed(tx) => {
            match tx {
                Some(tx) => println!("registered {student_id} (tx {}, block {})", tx.tx_hash, tx.block_height),
                None => println!("registered {student_id}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        SubmissionOutcome::AlreadyRecorded => {
            println!("{student_id} is already registered");
            Ok(ExitCode::SUCCESS)
        }
        SubmissionOutcome::Pending { tx_hash } => {
            println!("registration submitted, not yet confirmed (tx {tx_hash})");
            Ok(ExitCode::from(3))
        }
        SubmissionOutcome::Unknown(detail) => {
            println!("registration outcome unknown ({detail}); check again before resubmitting");
            Ok(ExitCode::from(3))
        }
        SubmissionOutcome::Rejected(reason) => Err(RollcallError::LedgerRejected { reason }),
        SubmissionOutcome::Unavailable(message) => Err(RollcallError::LedgerUnavailable { message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_renders_token() {
        let art = render_qr("CLS1|abc123|1700000300").unwrap();
        assert!(art.lines().count() > 10);
    }

    #[test]
    fn exit_codes_follow_outcome() {
        assert_eq!(mark_exit_status(&MarkOutcome::Expired), 2);
        assert_eq!(mark_exit_status(&MarkOutcome::Invalid("bad".into())), 2);
        assert_eq!(mark_exit_status(&MarkOutcome::Rejected("no".into())), 2);
    }

    #[test]
    fn times_are_formatted_in_utc() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00 UTC");
    }
}
