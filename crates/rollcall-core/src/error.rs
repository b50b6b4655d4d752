// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Rollcall attendance engine.

use thiserror::Error;

use crate::types::RevertReason;

/// The primary error type used across all Rollcall crates.
#[derive(Debug, Error)]
pub enum RollcallError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Local cache errors (database connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The ledger could not be reached after all retries were exhausted.
    ///
    /// Transient: the caller may retry the whole operation.
    #[error("ledger unavailable: {message}")]
    LedgerUnavailable { message: String },

    /// The ledger permanently refused a state-changing call.
    #[error("ledger rejected call: {reason}")]
    LedgerRejected { reason: RevertReason },

    /// The ledger answered with something the client could not interpret.
    #[error("ledger error: {message}")]
    Ledger {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Pinning or reading an evidence document failed.
    #[error("evidence store error: {message}")]
    Evidence {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Caller supplied input that can never succeed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RollcallError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Returns true when retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LedgerUnavailable { .. } | Self::Timeout { .. } | Self::Storage { .. }
        )
    }
}
