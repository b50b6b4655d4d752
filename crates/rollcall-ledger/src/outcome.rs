// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One place that turns submit and confirmation results into a verdict.
//!
//! Callers match on [`SubmissionOutcome`] and never on transport errors or
//! raw revert strings.

use rollcall_core::{RevertReason, RollcallError};

use crate::client::{Confirmation, ConfirmedTx, Submitted};

/// Final verdict on a state-changing ledger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The call took effect. `None` when a retried submission found its own
    /// earlier write already applied and no receipt is at hand.
    Confirmed(Option<ConfirmedTx>),
    /// The ledger already held the effect from someone else's call.
    AlreadyRecorded,
    /// Sent but not confirmed in time. Not cancelled.
    Pending { tx_hash: String },
    /// Retries ran out after an attempt that may have reached the node.
    /// Must not be blindly resubmitted.
    Unknown(String),
    /// Permanently refused. Never `AlreadyAttended`.
    Rejected(RevertReason),
    /// Transient failures exhausted every attempt.
    Unavailable(String),
}

impl SubmissionOutcome {
    /// Decodes the result of [`LedgerClient::submit`](crate::LedgerClient::submit).
    ///
    /// Errors other than rejection and unavailability are passed through.
    pub fn from_submit(result: Result<Submitted, RollcallError>) -> Result<Self, RollcallError> {
        match result {
            Ok(Submitted::Pending { tx_hash }) => Ok(Self::Pending { tx_hash }),
            Ok(Submitted::Landed) => Ok(Self::Confirmed(None)),
            Ok(Submitted::Unknown { detail }) => Ok(Self::Unknown(detail)),
            Err(RollcallError::LedgerRejected { reason }) => Ok(Self::from_revert(reason)),
            Err(RollcallError::LedgerUnavailable { message }) => Ok(Self::Unavailable(message)),
            Err(other) => Err(other),
        }
    }

    /// Decodes the result of awaiting a pending transaction.
    pub fn from_confirmation(tx_hash: &str, confirmation: Confirmation) -> Self {
        match confirmation {
            Confirmation::Confirmed(tx) => Self::Confirmed(Some(tx)),
            Confirmation::Reverted(reason) => Self::from_revert(reason),
            Confirmation::TimedOut => Self::Pending {
                tx_hash: tx_hash.to_string(),
            },
        }
    }

    fn from_revert(reason: RevertReason) -> Self {
        match reason {
            RevertReason::AlreadyAttended => Self::AlreadyRecorded,
            other => Self::Rejected(other),
        }
    }

    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Confirmed(_) => "confirmed",
            Self::AlreadyRecorded => "already_recorded",
            Self::Pending { .. } => "pending",
            Self::Unknown(_) => "unknown",
            Self::Rejected(_) => "rejected",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> ConfirmedTx {
        ConfirmedTx {
            tx_hash: "0x1".into(),
            block_height: 7,
            timestamp: 1_000,
        }
    }

    #[test]
    fn submit_results_decode() {
        assert_eq!(
            SubmissionOutcome::from_submit(Ok(Submitted::Pending {
                tx_hash: "0x1".into()
            }))
            .unwrap(),
            SubmissionOutcome::Pending {
                tx_hash: "0x1".into()
            }
        );
        assert_eq!(
            SubmissionOutcome::from_submit(Ok(Submitted::Landed)).unwrap(),
            SubmissionOutcome::Confirmed(None)
        );
        assert_eq!(
            SubmissionOutcome::from_submit(Err(RollcallError::LedgerRejected {
                reason: RevertReason::AlreadyAttended
            }))
            .unwrap(),
            SubmissionOutcome::AlreadyRecorded
        );
        assert_eq!(
            SubmissionOutcome::from_submit(Err(RollcallError::LedgerRejected {
                reason: RevertReason::Unauthorized
            }))
            .unwrap(),
            SubmissionOutcome::Rejected(RevertReason::Unauthorized)
        );
        assert_eq!(
            SubmissionOutcome::from_submit(Err(RollcallError::LedgerUnavailable {
                message: "down".into()
            }))
            .unwrap(),
            SubmissionOutcome::Unavailable("down".into())
        );
        assert_eq!(
            SubmissionOutcome::from_submit(Ok(Submitted::Unknown {
                detail: "timed out".into()
            }))
            .unwrap(),
            SubmissionOutcome::Unknown("timed out".into())
        );
        assert!(
            SubmissionOutcome::from_submit(Err(RollcallError::Ledger {
                message: "garbage".into(),
                source: None
            }))
            .is_err()
        );
    }

    #[test]
    fn confirmations_decode() {
        assert_eq!(
            SubmissionOutcome::from_confirmation("0x1", Confirmation::Confirmed(tx())),
            SubmissionOutcome::Confirmed(Some(tx()))
        );
        assert_eq!(
            SubmissionOutcome::from_confirmation("0x1", Confirmation::TimedOut),
            SubmissionOutcome::Pending {
                tx_hash: "0x1".into()
            }
        );
        assert_eq!(
            SubmissionOutcome::from_confirmation(
                "0x1",
                Confirmation::Reverted(RevertReason::AlreadyAttended)
            ),
            SubmissionOutcome::AlreadyRecorded
        );
        assert_eq!(
            SubmissionOutcome::from_confirmation(
                "0x1",
                Confirmation::Reverted(RevertReason::SessionInvalid)
            )
            .label(),
            "rejected"
        );
    }
}
