// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session issuance and scan handling against the in-memory ledger.

use std::sync::Arc;

use rollcall_config::PendingPolicy;
use rollcall_core::{
    AttendanceStore, LedgerCall, MarkOutcome, RecordState, RevertReason, RollcallError,
    TransportError,
};
use rollcall_engine::SessionCheck;
use rollcall_test_utils::TestHarness;

fn mark_call(session_code: &str, student_id: &str, class_id: &str) -> LedgerCall {
    LedgerCall::MarkAttendance {
        session_code: session_code.into(),
        student_id: student_id.into(),
        class_id: class_id.into(),
    }
}

// ---- Sessions ----

#[tokio::test]
async fn create_session_is_confirmed_on_ledger_before_storing() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();

    assert_eq!(session.class_id, "CLS1");
    assert_eq!(session.expires_at, session.issued_at + 300);
    assert!(session.ledger_tx_hash.is_some());
    assert!(h.ledger.has_session(&session.session_code).await);
    assert_eq!(
        h.sessions.get_session(&session.session_code).await.unwrap(),
        Some(session.clone())
    );
    assert_eq!(
        session.token().to_string(),
        format!("CLS1|{}|{}", session.session_code, session.expires_at)
    );
}

#[tokio::test]
async fn create_session_rejects_bad_input() {
    let h = TestHarness::new().await.unwrap();
    let cases = [
        ("", Some(300)),
        ("CLS|1", Some(300)),
        ("CLS1", Some(0)),
        ("CLS1", Some(-5)),
        ("CLS1", Some(86_401)),
    ];
    for (class, secs) in cases {
        let err = h.sessions.create_session(class, secs).await.unwrap_err();
        assert!(matches!(err, RollcallError::InvalidInput(_)), "{class:?} {secs:?}: {err}");
    }
    assert_eq!(h.ledger.sends().await, 0);
}

#[tokio::test]
async fn create_session_uses_default_duration() {
    let h = TestHarness::new().await.unwrap();
    let session = h.sessions.create_session("CLS1", None).await.unwrap();
    assert_eq!(session.duration_secs, 300);
}

#[tokio::test]
async fn create_session_fails_when_ledger_unreachable() {
    let h = TestHarness::builder().with_max_attempts(2).build().await.unwrap();
    h.ledger
        .fail_sends([
            TransportError::Unreachable("refused".into()),
            TransportError::Unreachable("refused".into()),
        ])
        .await;

    let err = h.session("CLS1", 300).await.unwrap_err();
    assert!(matches!(err, RollcallError::LedgerUnavailable { .. }));
    assert!(h.sessions.list_sessions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn unconfirmed_create_session_is_not_stored() {
    let h = TestHarness::new().await.unwrap();
    h.ledger.hold_transactions(true).await;

    let err = h.session("CLS1", 300).await.unwrap_err();
    assert!(matches!(err, RollcallError::LedgerUnavailable { .. }));
    assert!(h.sessions.list_sessions(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn session_validity_follows_clock_and_ledger() {
    let h = TestHarness::new().await.unwrap();
    let a = h.session("CLS1", 300).await.unwrap();
    let b = h.session("CLS2", 300).await.unwrap();

    assert!(h.sessions.is_valid(&a.session_code).await.unwrap());
    assert!(!h.sessions.is_valid("no-such-code").await.unwrap());
    assert_eq!(h.sessions.check("no-such-code").await.unwrap(), SessionCheck::Unknown);

    h.ledger.end_session(&b.session_code).await;
    assert!(!h.sessions.is_valid(&b.session_code).await.unwrap());

    h.clock.advance(299);
    assert!(h.sessions.is_valid(&a.session_code).await.unwrap());
    h.clock.advance(1);
    assert!(!h.sessions.is_valid(&a.session_code).await.unwrap());

    let listed = h.sessions.list_sessions(Some("CLS1")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_code, a.session_code);
}

#[tokio::test]
async fn unreachable_ledger_falls_back_to_local_validity() {
    let h = TestHarness::builder().with_max_attempts(1).build().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger
        .fail_queries([TransportError::Unreachable("refused".into())])
        .await;
    assert!(h.sessions.is_valid(&session.session_code).await.unwrap());
}

// ---- Scans ----

#[tokio::test]
async fn scan_records_then_reports_duplicate() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();

    let first = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::Recorded(record) = first else {
        panic!("expected Recorded, got {first:?}");
    };
    assert!(record.verified());
    assert!(record.ledger_tx_hash.is_some());
    assert_eq!(record.submit_attempts, 1);

    let sends = h.ledger.sends().await;
    let second = h.scan(&session, "stu1").await.unwrap();
    assert!(matches!(second, MarkOutcome::AlreadyRecorded(_)));
    assert_eq!(h.ledger.sends().await, sends);
    assert_eq!(h.ledger.records().await.len(), 1);
}

#[tokio::test]
async fn malformed_tokens_are_invalid() {
    let h = TestHarness::new().await.unwrap();
    for token in ["", "abc", "CLS1|code", "CLS1|code|123|extra", "CLS1|code|soon", "|code|1"] {
        let outcome = h.recorder.mark_attendance(token, "stu1").await.unwrap();
        assert!(matches!(outcome, MarkOutcome::Invalid(_)), "{token:?} -> {outcome:?}");
    }
    assert_eq!(h.ledger.sends().await, 0);
}

#[tokio::test]
async fn empty_student_is_invalid() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    assert!(matches!(
        h.scan(&session, "  ").await.unwrap(),
        MarkOutcome::Invalid(_)
    ));
}

#[tokio::test]
async fn unknown_session_and_class_mismatch_are_invalid() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    let exp = session.expires_at;

    let unknown = h
        .recorder
        .mark_attendance(&format!("CLS1|deadbeef|{exp}"), "stu1")
        .await
        .unwrap();
    assert!(matches!(unknown, MarkOutcome::Invalid(_)));

    let mismatch = h
        .recorder
        .mark_attendance(&format!("CLS9|{}|{exp}", session.session_code), "stu1")
        .await
        .unwrap();
    assert!(matches!(mismatch, MarkOutcome::Invalid(_)));
    assert!(h.ledger.records().await.is_empty());
}

#[tokio::test]
async fn past_expiry_is_rejected_without_ledger_round_trip() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.clock.advance(301);

    let queries = h.ledger.queries().await;
    assert_eq!(h.scan(&session, "stu1").await.unwrap(), MarkOutcome::Expired);
    assert_eq!(h.ledger.queries().await, queries);
}

#[tokio::test]
async fn tampered_expiry_still_expires_with_session() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.clock.advance(400);

    let forged = format!("CLS1|{}|{}", session.session_code, session.expires_at + 10_000);
    assert_eq!(
        h.recorder.mark_attendance(&forged, "stu1").await.unwrap(),
        MarkOutcome::Expired
    );
}

#[tokio::test]
async fn ledger_ended_session_reports_expired() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger.end_session(&session.session_code).await;
    assert_eq!(h.scan(&session, "stu1").await.unwrap(), MarkOutcome::Expired);
}

#[tokio::test]
async fn ledger_duplicate_heals_local_cache() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    let tx = h
        .ledger
        .apply(mark_call(&session.session_code, "stu1", "CLS1"))
        .await
        .unwrap();

    let outcome = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::AlreadyRecorded(record) = outcome else {
        panic!("expected AlreadyRecorded, got {outcome:?}");
    };
    assert_eq!(record.state, RecordState::Confirmed);
    assert_eq!(record.ledger_tx_hash.as_deref(), Some(tx.as_str()));
}

#[tokio::test]
async fn unconfirmed_scan_reports_pending() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger.hold_transactions(true).await;

    let outcome = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::ConfirmationPending(record) = outcome else {
        panic!("expected ConfirmationPending, got {outcome:?}");
    };
    assert_eq!(record.state, RecordState::Provisional);
    assert!(record.pending_tx.is_some());
    assert_eq!(h.ledger.pending().await, 1);

    // A re-scan while pending must not submit again.
    let sends = h.ledger.sends().await;
    assert!(matches!(
        h.scan(&session, "stu1").await.unwrap(),
        MarkOutcome::AlreadyRecorded(_)
    ));
    assert_eq!(h.ledger.sends().await, sends);
}

#[tokio::test]
async fn optimistic_policy_reports_pending_as_recorded() {
    let h = TestHarness::builder()
        .with_pending_policy(PendingPolicy::Optimistic)
        .build()
        .await
        .unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger.hold_transactions(true).await;

    let outcome = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::Recorded(record) = outcome else {
        panic!("expected Recorded, got {outcome:?}");
    };
    assert!(!record.verified());
}

#[tokio::test]
async fn ledger_revert_rejects_and_allows_reclaim() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger.require_registration(true).await;

    let outcome = h.scan(&session, "stu1").await.unwrap();
    assert_eq!(
        outcome,
        MarkOutcome::Rejected(RevertReason::StudentNotRegistered.to_string())
    );
    let stored = h
        .store
        .get_record(&session.session_code, "stu1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, RecordState::Rejected);

    h.client.register_student("stu1", "0xabc").await.unwrap();
    let MarkOutcome::Recorded(record) = h.scan(&session, "stu1").await.unwrap() else {
        panic!("re-scan after registration should record");
    };
    assert!(record.verified());
    assert_eq!(record.reject_reason, None);
    assert_eq!(
        h.ledger.records().await[0].student_address.as_deref(),
        Some("0xabc")
    );
}

#[tokio::test]
async fn own_landed_retry_counts_as_recorded() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger.land_then_fail([TransportError::TimedOut]).await;

    let outcome = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::Recorded(record) = outcome else {
        panic!("expected Recorded, got {outcome:?}");
    };
    assert!(record.verified());
    assert_eq!(record.ledger_tx_hash, h.ledger.records().await[0].tx_hash);
    assert_eq!(h.ledger.records().await.len(), 1);
}

#[tokio::test]
async fn sequence_conflict_is_retried_after_refresh() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger
        .fail_sends([TransportError::SequenceConflict("nonce too low".into())])
        .await;

    assert!(matches!(
        h.scan(&session, "stu1").await.unwrap(),
        MarkOutcome::Recorded(_)
    ));
    assert_eq!(h.ledger.refreshes().await, 1);
}

#[tokio::test]
async fn exhausted_ledger_retries_surface_as_unavailable() {
    let h = TestHarness::builder().with_max_attempts(2).build().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger
        .fail_sends([
            TransportError::Unreachable("refused".into()),
            TransportError::Unreachable("refused".into()),
        ])
        .await;

    let err = h.scan(&session, "stu1").await.unwrap_err();
    assert!(matches!(err, RollcallError::LedgerUnavailable { .. }));
    let stored = h
        .store
        .get_record(&session.session_code, "stu1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, RecordState::Rejected);

    // The caller may retry once the ledger is back.
    assert!(matches!(
        h.scan(&session, "stu1").await.unwrap(),
        MarkOutcome::Recorded(_)
    ));
}

#[tokio::test]
async fn lost_responses_leave_mark_pending_not_rejected() {
    let h = TestHarness::builder().with_max_attempts(2).build().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    // Every attempt reaches the ledger, every response is lost.
    h.ledger
        .land_then_fail([TransportError::TimedOut, TransportError::TimedOut])
        .await;

    let outcome = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::ConfirmationPending(record) = outcome else {
        panic!("expected ConfirmationPending, got {outcome:?}");
    };
    assert_eq!(record.state, RecordState::Provisional);
    assert_eq!(record.pending_tx, None);
    assert_eq!(record.submit_attempts, 1);
    assert_eq!(h.ledger.records().await.len(), 1);

    // A re-scan must not resubmit.
    let sends = h.ledger.sends().await;
    assert!(matches!(
        h.scan(&session, "stu1").await.unwrap(),
        MarkOutcome::AlreadyRecorded(_)
    ));
    assert_eq!(h.ledger.sends().await, sends);

    h.reconcile().await.unwrap();
    let stored = h
        .store
        .get_record(&session.session_code, "stu1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, RecordState::Confirmed);
    assert_eq!(stored.ledger_tx_hash, h.ledger.records().await[0].tx_hash);
}

#[tokio::test]
async fn lost_responses_count_as_recorded_when_optimistic() {
    let h = TestHarness::builder()
        .with_max_attempts(2)
        .with_pending_policy(PendingPolicy::Optimistic)
        .build()
        .await
        .unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    h.ledger
        .land_then_fail([TransportError::TimedOut, TransportError::Busy("503".into())])
        .await;

    let MarkOutcome::Recorded(record) = h.scan(&session, "stu1").await.unwrap() else {
        panic!("optimistic policy should report Recorded");
    };
    assert_eq!(record.state, RecordState::Provisional);
}

#[tokio::test]
async fn mark_raced_by_another_node_is_adopted() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    // Lands after our hasAttended read, before our send is pre-flighted.
    h.ledger
        .race_next_send(mark_call(&session.session_code, "stu1", "CLS1"))
        .await;
    let sends = h.ledger.sends().await;

    let outcome = h.scan(&session, "stu1").await.unwrap();
    let MarkOutcome::AlreadyRecorded(record) = outcome else {
        panic!("expected AlreadyRecorded, got {outcome:?}");
    };
    let ledger_records = h.ledger.records().await;
    assert_eq!(ledger_records.len(), 1);
    assert_eq!(record.state, RecordState::Confirmed);
    assert_eq!(record.ledger_tx_hash, ledger_records[0].tx_hash);
    assert_eq!(h.ledger.sends().await - sends, 1);

    let stored = h
        .store
        .get_record(&session.session_code, "stu1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, RecordState::Confirmed);
    assert_eq!(stored.ledger_tx_hash, ledger_records[0].tx_hash);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_record_at_most_once() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    let token = session.token().to_string();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let recorder = Arc::clone(&h.recorder);
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            recorder.mark_attendance(&token, "stu1").await
        }));
    }

    let mut recorded = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            MarkOutcome::Recorded(_) => recorded += 1,
            MarkOutcome::AlreadyRecorded(_) => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(recorded, 1);
    assert_eq!(h.ledger.records().await.len(), 1);
    let local = h
        .store
        .get_record(&session.session_code, "stu1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local.state, RecordState::Confirmed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_by_different_students_all_record() {
    let h = TestHarness::new().await.unwrap();
    let session = h.session("CLS1", 300).await.unwrap();
    let token = session.token().to_string();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let recorder = Arc::clone(&h.recorder);
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            recorder.mark_attendance(&token, &format!("stu{i}")).await
        }));
    }
    for task in tasks {
        assert!(matches!(task.await.unwrap().unwrap(), MarkOutcome::Recorded(_)));
    }
    assert_eq!(h.ledger.records().await.len(), 8);
}
