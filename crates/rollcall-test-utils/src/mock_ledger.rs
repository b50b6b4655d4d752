// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory attendance contract implementing [`LedgerTransport`].
//!
//! Enforces the same rules as the deployed contract (valid session, one
//! mark per student per session, optional student registration) and lets
//! tests inject transport faults, hold transactions in a mempool, and write
//! to the ledger directly as another node would.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use rollcall_core::{
    Clock, HealthStatus, LedgerCall, LedgerQuery, LedgerRecord, LedgerTransport, QueryValue,
    TransportError, TxReceipt,
};

pub const REVERT_SESSION_INVALID: &str = "Session is invalid or expired";
pub const REVERT_ALREADY_MARKED: &str = "Attendance already marked for this session";
pub const REVERT_NOT_REGISTERED: &str = "Student not registered";
pub const REVERT_SESSION_EXISTS: &str = "Session already exists";

#[derive(Debug, Clone)]
struct LedgerSession {
    class_id: String,
    expires_at: i64,
}

#[derive(Default)]
struct LedgerState {
    sessions: HashMap<String, LedgerSession>,
    records: Vec<LedgerRecord>,
    attended: HashSet<(String, String)>,
    students: HashMap<String, String>,
    require_registration: bool,
    receipts: HashMap<String, TxReceipt>,
    mempool: VecDeque<(String, LedgerCall)>,
    hold: bool,
    next_tx: u64,
    block_height: u64,
    send_faults: VecDeque<TransportError>,
    land_faults: VecDeque<TransportError>,
    query_faults: VecDeque<TransportError>,
    receipt_faults: VecDeque<TransportError>,
    races: VecDeque<LedgerCall>,
    sends: u32,
    refreshes: u32,
    queries: u32,
    unhealthy: bool,
}

impl LedgerState {
    fn next_hash(&mut self) -> String {
        self.next_tx += 1;
        format!("0x{:064x}", self.next_tx)
    }

    /// Runs the contract rules for `call` and applies it on success.
    fn execute(&mut self, tx_hash: &str, call: &LedgerCall, now: i64) -> Result<(), String> {
        match call {
            LedgerCall::CreateSession {
                session_code,
                class_id,
                duration_secs,
            } => {
                if self.sessions.contains_key(session_code) {
                    return Err(REVERT_SESSION_EXISTS.to_string());
                }
                self.sessions.insert(
                    session_code.clone(),
                    LedgerSession {
                        class_id: class_id.clone(),
                        expires_at: now + duration_secs,
                    },
                );
            }
            LedgerCall::MarkAttendance {
                session_code,
                student_id,
                class_id,
            } => {
                let valid = self
                    .sessions
                    .get(session_code)
                    .is_some_and(|s| now < s.expires_at && s.class_id == *class_id);
                if !valid {
                    return Err(REVERT_SESSION_INVALID.to_string());
                }
                let key = (session_code.clone(), student_id.clone());
                if self.attended.contains(&key) {
                    return Err(REVERT_ALREADY_MARKED.to_string());
                }
                let student_address = self.students.get(student_id).cloned();
                if self.require_registration && student_address.is_none() {
                    return Err(REVERT_NOT_REGISTERED.to_string());
                }
                self.attended.insert(key);
                self.records.push(LedgerRecord {
                    session_code: session_code.clone(),
                    class_id: class_id.clone(),
                    student_id: student_id.clone(),
                    student_address,
                    timestamp: now,
                    verified: true,
                    tx_hash: Some(tx_hash.to_string()),
                });
            }
            LedgerCall::RegisterStudent {
                student_id,
                student_address,
            } => {
                self.students
                    .insert(student_id.clone(), student_address.clone());
            }
        }
        Ok(())
    }

    /// Mines `call` into a new block and stores its receipt.
    fn mine(&mut self, tx_hash: String, call: &LedgerCall, now: i64) -> Option<String> {
        let revert = self.execute(&tx_hash, call, now).err();
        self.block_height += 1;
        self.receipts.insert(
            tx_hash.clone(),
            TxReceipt {
                tx_hash,
                block_height: self.block_height,
                timestamp: now,
                revert: revert.clone(),
            },
        );
        revert
    }
}

/// In-memory ledger sharing a clock with the engine under test.
#[derive(Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
    clock: Arc<dyn Clock>,
}

impl MockLedger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            clock,
        }
    }

    /// Writes `call` straight to the ledger, bypassing faults and the
    /// mempool. Simulates another node, or a submission whose local
    /// follow-up was lost. Returns the tx hash or the revert message.
    pub async fn apply(&self, call: LedgerCall) -> Result<String, String> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let tx_hash = state.next_hash();
        match state.mine(tx_hash.clone(), &call, now) {
            None => Ok(tx_hash),
            Some(revert) => Err(revert),
        }
    }

    /// Queues errors returned by the next sends. The calls are not applied.
    pub async fn fail_sends(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.state.lock().await.send_faults.extend(errors);
    }

    /// Queues errors returned by the next sends *after* the call has been
    /// applied, as when a response is lost on the way back.
    pub async fn land_then_fail(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.state.lock().await.land_faults.extend(errors);
    }

    /// Queues a call that another node lands just before the next send is
    /// pre-flighted, so it wins a race the sender cannot see.
    pub async fn race_next_send(&self, call: LedgerCall) {
        self.state.lock().await.races.push_back(call);
    }

    pub async fn fail_queries(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.state.lock().await.query_faults.extend(errors);
    }

    pub async fn fail_receipts(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.state.lock().await.receipt_faults.extend(errors);
    }

    /// When on, sent transactions wait in the mempool until [`mine_pending`](Self::mine_pending).
    pub async fn hold_transactions(&self, hold: bool) {
        self.state.lock().await.hold = hold;
    }

    /// Mines every held transaction in send order. Returns how many were mined.
    pub async fn mine_pending(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let pending: Vec<_> = state.mempool.drain(..).collect();
        let count = pending.len();
        for (tx_hash, call) in pending {
            state.mine(tx_hash, &call, now);
        }
        count
    }

    /// Drops every held transaction, as if the node restarted.
    pub async fn drop_pending(&self) -> usize {
        let mut state = self.state.lock().await;
        let count = state.mempool.len();
        state.mempool.clear();
        count
    }

    /// Makes the ledger consider a session over, whatever its expiry.
    pub async fn end_session(&self, session_code: &str) {
        let now = self.clock.now();
        if let Some(session) = self.state.lock().await.sessions.get_mut(session_code) {
            session.expires_at = now;
        }
    }

    pub async fn require_registration(&self, required: bool) {
        self.state.lock().await.require_registration = required;
    }

    pub async fn set_healthy(&self, healthy: bool) {
        self.state.lock().await.unhealthy = !healthy;
    }

    pub async fn records(&self) -> Vec<LedgerRecord> {
        self.state.lock().await.records.clone()
    }

    pub async fn has_session(&self, session_code: &str) -> bool {
        self.state.lock().await.sessions.contains_key(session_code)
    }

    pub async fn sends(&self) -> u32 {
        self.state.lock().await.sends
    }

    pub async fn refreshes(&self) -> u32 {
        self.state.lock().await.refreshes
    }

    pub async fn queries(&self) -> u32 {
        self.state.lock().await.queries
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.mempool.len()
    }
}

#[async_trait]
impl LedgerTransport for MockLedger {
    async fn send(&self, call: &LedgerCall) -> Result<String, TransportError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.sends += 1;
        if let Some(err) = state.send_faults.pop_front() {
            return Err(err);
        }
        if let Some(foreign) = state.races.pop_front() {
            let foreign_hash = state.next_hash();
            state.mine(foreign_hash, &foreign, now);
        }

        let tx_hash = state.next_hash();
        if let Some(err) = state.land_faults.pop_front() {
            state.mine(tx_hash, call, now);
            return Err(err);
        }
        if state.hold {
            state.mempool.push_back((tx_hash.clone(), call.clone()));
            return Ok(tx_hash);
        }

        // Pre-flight: a call that would revert is refused before broadcast.
        let mut preview = LedgerState {
            sessions: state.sessions.clone(),
            attended: state.attended.clone(),
            students: state.students.clone(),
            require_registration: state.require_registration,
            ..LedgerState::default()
        };
        if let Err(revert) = preview.execute(&tx_hash, call, now) {
            return Err(TransportError::Reverted(revert));
        }
        state.mine(tx_hash.clone(), call, now);
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, TransportError> {
        let mut state = self.state.lock().await;
        if let Some(err) = state.receipt_faults.pop_front() {
            return Err(err);
        }
        Ok(state.receipts.get(tx_hash).cloned())
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryValue, TransportError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.queries += 1;
        if let Some(err) = state.query_faults.pop_front() {
            return Err(err);
        }
        let value = match query {
            LedgerQuery::IsSessionValid { session_code } => QueryValue::Bool(
                state
                    .sessions
                    .get(session_code)
                    .is_some_and(|s| now < s.expires_at),
            ),
            LedgerQuery::HasAttended {
                session_code,
                student_id,
            } => QueryValue::Bool(
                state
                    .attended
                    .contains(&(session_code.clone(), student_id.clone())),
            ),
            LedgerQuery::GetAttendanceRecord {
                session_code,
                student_id,
            } => QueryValue::Record(
                state
                    .records
                    .iter()
                    .find(|r| r.session_code == *session_code && r.student_id == *student_id)
                    .cloned(),
            ),
            LedgerQuery::GetTotalRecords => QueryValue::Count(state.records.len() as u64),
            LedgerQuery::GetRecordByIndex { index } => QueryValue::Record(
                usize::try_from(*index)
                    .ok()
                    .and_then(|i| state.records.get(i))
                    .cloned(),
            ),
        };
        Ok(value)
    }

    async fn refresh_sequence(&self) -> Result<(), TransportError> {
        self.state.lock().await.refreshes += 1;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if self.state.lock().await.unhealthy {
            HealthStatus::Unhealthy("mock ledger marked unhealthy".into())
        } else {
            HealthStatus::Healthy
        }
    }
}
