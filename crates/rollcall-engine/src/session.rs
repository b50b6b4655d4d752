// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session issuance and validity.

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use rollcall_config::EngineConfig;
use rollcall_core::{
    AttendanceStore, Clock, LedgerCall, RevertReason, RollcallError, Session, SessionStatus,
};
use rollcall_ledger::{LedgerClient, SubmissionOutcome};
use tracing::{debug, info, warn};

/// Bytes of OS randomness in a session code.
const SESSION_CODE_BYTES: usize = 16;

/// Generates an unguessable, non-sequential session code.
pub fn generate_session_code() -> String {
    let mut bytes = [0u8; SESSION_CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Validity of a session code as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// No session with this code was issued here.
    Unknown,
    /// Past local expiry, or the ledger says it is no longer valid.
    Expired(Session),
    Valid(Session),
}

/// Issues sessions and answers validity questions about them.
pub struct SessionManager {
    store: Arc<dyn AttendanceStore>,
    ledger: LedgerClient,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    verify_on_ledger: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        ledger: LedgerClient,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        verify_on_ledger: bool,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            config,
            verify_on_ledger,
        }
    }

    /// Issues a session for `class_id`.
    ///
    /// The `createSession` call must be confirmed on the ledger before the
    /// session is stored; a confirmation timeout fails the call with
    /// `LedgerUnavailable` and nothing is stored.
    pub async fn create_session(
        &self,
        class_id: &str,
        duration_secs: Option<i64>,
    ) -> Result<Session, RollcallError> {
        let class_id = class_id.trim();
        if class_id.is_empty() {
            return Err(RollcallError::InvalidInput("class id must not be empty".into()));
        }
        if class_id.contains('|') {
            return Err(RollcallError::InvalidInput(
                "class id must not contain `|`".into(),
            ));
        }
        let duration_secs = duration_secs.unwrap_or(self.config.default_session_secs);
        if duration_secs <= 0 {
            return Err(RollcallError::InvalidInput(format!(
                "session duration must be positive, got {duration_secs}"
            )));
        }
        if duration_secs > self.config.max_session_secs {
            return Err(RollcallError::InvalidInput(format!(
                "session duration {duration_secs}s exceeds the {}s limit",
                self.config.max_session_secs
            )));
        }

        let mut session = Session::new(
            generate_session_code(),
            class_id.to_string(),
            self.clock.now(),
            duration_secs,
        );
        let call = LedgerCall::CreateSession {
            session_code: session.session_code.clone(),
            class_id: session.class_id.clone(),
            duration_secs,
        };

        match self.ledger.execute(&call).await? {
            SubmissionOutcome::Confirmed(tx) => {
                session.ledger_tx_hash = tx.map(|t| t.tx_hash);
            }
            SubmissionOutcome::Pending { tx_hash } => {
                warn!(class_id, tx_hash = %tx_hash, "createSession not confirmed in time");
                return Err(RollcallError::LedgerUnavailable {
                    message: format!(
                        "createSession {tx_hash} not confirmed within {:?}",
                        self.ledger.confirmation_timeout()
                    ),
                });
            }
            SubmissionOutcome::Unavailable(message) => {
                return Err(RollcallError::LedgerUnavailable { message });
            }
            // The code is never reused, so a session that did land stays orphaned.
            SubmissionOutcome::Unknown(message) => {
                warn!(class_id, detail = %message, "createSession outcome unknown");
                return Err(RollcallError::LedgerUnavailable { message });
            }
            SubmissionOutcome::Rejected(reason) => {
                return Err(RollcallError::LedgerRejected { reason });
            }
            SubmissionOutcome::AlreadyRecorded => {
                return Err(RollcallError::LedgerRejected {
                    reason: RevertReason::AlreadyAttended,
                });
            }
        }

        self.store.insert_session(&session).await?;
        crate::metrics::record_session_created();
        info!(
            class_id = %session.class_id,
            session_code = %session.session_code,
            expires_at = session.expires_at,
            "session created"
        );
        Ok(session)
    }

    /// Classifies a session code. Local expiry is checked first; when
    /// ledger verification is on, the ledger has the final word.
    pub async fn check(&self, session_code: &str) -> Result<SessionCheck, RollcallError> {
        let Some(session) = self.store.get_session(session_code).await? else {
            return Ok(SessionCheck::Unknown);
        };
        if session.status(self.clock.now()) == SessionStatus::Expired {
            return Ok(SessionCheck::Expired(session));
        }
        if !self.verify_on_ledger {
            return Ok(SessionCheck::Valid(session));
        }

        match self.ledger.is_session_valid(session_code).await {
            Ok(true) => Ok(SessionCheck::Valid(session)),
            Ok(false) => {
                debug!(session_code, "ledger reports session invalid");
                Ok(SessionCheck::Expired(session))
            }
            Err(e) if e.is_retryable() => {
                warn!(session_code, error = %e, "ledger unreachable, using local session validity");
                Ok(SessionCheck::Valid(session))
            }
            Err(e) => Err(e),
        }
    }

    /// True iff a known session exists, is unexpired, and the ledger agrees.
    pub async fn is_valid(&self, session_code: &str) -> Result<bool, RollcallError> {
        Ok(matches!(self.check(session_code).await?, SessionCheck::Valid(_)))
    }

    pub async fn get_session(&self, session_code: &str) -> Result<Option<Session>, RollcallError> {
        self.store.get_session(session_code).await
    }

    pub async fn list_sessions(&self, class_id: Option<&str>) -> Result<Vec<Session>, RollcallError> {
        self.store.list_sessions(class_id).await
    }

    /// Local status only; no ledger round-trip.
    pub fn status(&self, session: &Session) -> SessionStatus {
        session.status(self.clock.now())
    }
}
