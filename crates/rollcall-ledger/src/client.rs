// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrying client over a [`LedgerTransport`].
//!
//! Transient transport failures are retried with jittered backoff, a
//! sequence conflict gets one retry after a refresh, and reverts are never
//! retried. Confirmation waits are bounded and never cancel a transaction.

use std::sync::Arc;
use std::time::Duration;

use rollcall_config::LedgerConfig;
use rollcall_core::{
    HealthStatus, LedgerCall, LedgerQuery, LedgerRecord, LedgerTransport, QueryValue,
    RevertReason, RollcallError, TransportError, TxReceipt,
};
use tracing::{debug, info, warn};

use crate::outcome::SubmissionOutcome;
use crate::retry::RetryPolicy;

/// Result of broadcasting a state-changing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// Accepted by the node; outcome unknown until mined.
    Pending { tx_hash: String },
    /// An earlier ambiguous attempt of this same call already took effect.
    Landed,
    /// Attempts ran out after at least one of them may have reached the
    /// node. The call may or may not have taken effect.
    Unknown { detail: String },
}

/// A mined, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTx {
    pub tx_hash: String,
    pub block_height: u64,
    /// Block timestamp, Unix seconds.
    pub timestamp: i64,
}

/// Result of waiting for a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed(ConfirmedTx),
    /// Mined but reverted.
    Reverted(RevertReason),
    /// Still unmined when the wait ran out.
    TimedOut,
}

/// Ledger access with retry and confirmation tracking.
#[derive(Clone)]
pub struct LedgerClient {
    transport: Arc<dyn LedgerTransport>,
    retry: RetryPolicy,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl LedgerClient {
    pub fn new(transport: Arc<dyn LedgerTransport>, config: &LedgerConfig) -> Self {
        Self::with_policy(
            transport,
            RetryPolicy::from_config(config),
            config.confirmation_timeout(),
            config.poll_interval(),
        )
    }

    pub fn with_policy(
        transport: Arc<dyn LedgerTransport>,
        retry: RetryPolicy,
        confirmation_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            retry,
            confirmation_timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    /// Broadcasts `call`.
    ///
    /// A revert of "already attended" after an ambiguous failure (the
    /// request may have reached the node) means the earlier attempt landed,
    /// and is reported as [`Submitted::Landed`]. Giving up after an
    /// ambiguous failure is [`Submitted::Unknown`], never an error: only a
    /// run of undelivered attempts is `LedgerUnavailable`.
    pub async fn submit(&self, call: &LedgerCall) -> Result<Submitted, RollcallError> {
        let action = call.name();
        let mut ambiguous = false;
        let mut refreshed = false;
        let mut attempt = 0;

        loop {
            let err = match self.transport.send(call).await {
                Ok(tx_hash) => {
                    debug!(action, tx_hash = %tx_hash, attempt, "ledger call submitted");
                    return Ok(Submitted::Pending { tx_hash });
                }
                Err(err) => err,
            };

            match err {
                TransportError::Reverted(message) => {
                    let reason = RevertReason::classify(&message);
                    if ambiguous && reason == RevertReason::AlreadyAttended {
                        info!(action, "retried submission had already landed");
                        return Ok(Submitted::Landed);
                    }
                    debug!(action, reason = %reason, "ledger call reverted");
                    return Err(RollcallError::LedgerRejected { reason });
                }
                TransportError::SequenceConflict(message) if !refreshed => {
                    warn!(action, detail = %message, "sequence conflict, refreshing before retry");
                    refreshed = true;
                    if let Err(e) = self.transport.refresh_sequence().await {
                        warn!(action, error = %e, "sequence refresh failed");
                    }
                }
                TransportError::SequenceConflict(message) => {
                    return give_up(
                        action,
                        ambiguous,
                        format!("{action}: sequence conflict after refresh: {message}"),
                    );
                }
                err if err.is_transient() => {
                    ambiguous |= err.is_ambiguous();
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        warn!(action, attempts = attempt, error = %err, ambiguous, "ledger retries exhausted");
                        return give_up(action, ambiguous, format!("{action}: {err}"));
                    }
                    let delay = self.retry.next_delay(attempt - 1);
                    warn!(action, attempt, ?delay, error = %err, "transient ledger failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                err => return Err(ledger_error(action, err)),
            }
        }
    }

    /// Polls for the receipt of `tx_hash` until it is mined or the
    /// confirmation timeout passes.
    pub async fn await_confirmation(&self, tx_hash: &str) -> Result<Confirmation, RollcallError> {
        let poll = async {
            loop {
                match self.transport.receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Ok(confirmation_from(receipt)),
                    Ok(None) => {}
                    Err(e) if e.is_transient() => {
                        debug!(tx_hash, error = %e, "receipt poll failed, will retry");
                    }
                    Err(e) => return Err(ledger_error("receipt", e)),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(self.confirmation_timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                info!(tx_hash, timeout = ?self.confirmation_timeout, "confirmation still pending");
                Ok(Confirmation::TimedOut)
            }
        }
    }

    /// Submits `call`, waits for confirmation, and decodes the verdict.
    pub async fn execute(&self, call: &LedgerCall) -> Result<SubmissionOutcome, RollcallError> {
        match SubmissionOutcome::from_submit(self.submit(call).await)? {
            SubmissionOutcome::Pending { tx_hash } => {
                let confirmation = self.await_confirmation(&tx_hash).await?;
                Ok(SubmissionOutcome::from_confirmation(&tx_hash, confirmation))
            }
            other => Ok(other),
        }
    }

    /// Single receipt lookup, retried on transient failures.
    pub async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, RollcallError> {
        self.retry
            .retry_when(|_| self.transport.receipt(tx_hash), TransportError::is_transient)
            .await
            .map_err(|e| ledger_error("receipt", e))
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryValue, RollcallError> {
        self.retry
            .retry_when(|_| self.transport.query(query), TransportError::is_transient)
            .await
            .map_err(|e| ledger_error(query.name(), e))
    }

    pub async fn read_bool(&self, query: &LedgerQuery) -> Result<bool, RollcallError> {
        match self.query(query).await? {
            QueryValue::Bool(value) => Ok(value),
            other => Err(unexpected(query, "bool", &other)),
        }
    }

    pub async fn read_count(&self, query: &LedgerQuery) -> Result<u64, RollcallError> {
        match self.query(query).await? {
            QueryValue::Count(value) => Ok(value),
            other => Err(unexpected(query, "count", &other)),
        }
    }

    pub async fn read_record(
        &self,
        query: &LedgerQuery,
    ) -> Result<Option<LedgerRecord>, RollcallError> {
        match self.query(query).await? {
            QueryValue::Record(record) => Ok(record),
            other => Err(unexpected(query, "record", &other)),
        }
    }

    pub async fn is_session_valid(&self, session_code: &str) -> Result<bool, RollcallError> {
        self.read_bool(&LedgerQuery::IsSessionValid {
            session_code: session_code.to_string(),
        })
        .await
    }

    pub async fn has_attended(
        &self,
        session_code: &str,
        student_id: &str,
    ) -> Result<bool, RollcallError> {
        self.read_bool(&LedgerQuery::HasAttended {
            session_code: session_code.to_string(),
            student_id: student_id.to_string(),
        })
        .await
    }

    pub async fn attendance_record(
        &self,
        session_code: &str,
        student_id: &str,
    ) -> Result<Option<LedgerRecord>, RollcallError> {
        self.read_record(&LedgerQuery::GetAttendanceRecord {
            session_code: session_code.to_string(),
            student_id: student_id.to_string(),
        })
        .await
    }

    pub async fn total_records(&self) -> Result<u64, RollcallError> {
        self.read_count(&LedgerQuery::GetTotalRecords).await
    }

    pub async fn record_by_index(&self, index: u64) -> Result<Option<LedgerRecord>, RollcallError> {
        self.read_record(&LedgerQuery::GetRecordByIndex { index }).await
    }

    /// Registers a student's ledger address, waiting for confirmation.
    pub async fn register_student(
        &self,
        student_id: &str,
        student_address: &str,
    ) -> Result<SubmissionOutcome, RollcallError> {
        self.execute(&LedgerCall::RegisterStudent {
            student_id: student_id.to_string(),
            student_address: student_address.to_string(),
        })
        .await
    }

    pub async fn health_check(&self) -> HealthStatus {
        self.transport.health_check().await
    }
}

fn confirmation_from(receipt: TxReceipt) -> Confirmation {
    match receipt.revert {
        Some(message) => Confirmation::Reverted(RevertReason::classify(&message)),
        None => Confirmation::Confirmed(ConfirmedTx {
            tx_hash: receipt.tx_hash,
            block_height: receipt.block_height,
            timestamp: receipt.timestamp,
        }),
    }
}

fn give_up(action: &str, ambiguous: bool, message: String) -> Result<Submitted, RollcallError> {
    if ambiguous {
        info!(action, "submission outcome unknown, leaving it to reconciliation");
        Ok(Submitted::Unknown { detail: message })
    } else {
        Err(RollcallError::LedgerUnavailable { message })
    }
}

/// Maps a transport failure that will not be retried any further.
fn ledger_error(action: &str, err: TransportError) -> RollcallError {
    match err {
        err if err.is_transient() => RollcallError::LedgerUnavailable {
            message: format!("{action}: {err}"),
        },
        TransportError::Reverted(message) => RollcallError::LedgerRejected {
            reason: RevertReason::classify(&message),
        },
        err => RollcallError::Ledger {
            message: format!("{action}: {err}"),
            source: Some(Box::new(err)),
        },
    }
}

fn unexpected(query: &LedgerQuery, expected: &str, got: &QueryValue) -> RollcallError {
    RollcallError::Ledger {
        message: format!("{} returned {got:?}, expected {expected}", query.name()),
        source: None,
    }
}
