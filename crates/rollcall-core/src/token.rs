// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! QR token wire format: `classId|sessionCode|expiresAtUnixSeconds`.
//!
//! External QR generators and scanners depend on this exact layout, so the
//! parser is strict: exactly three pipe-delimited fields, non-empty ids, and
//! an integer expiry.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SEPARATOR: char = '|';

/// Why a scanned token was rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("expected 3 pipe-delimited fields, found {0}")]
    FieldCount(usize),
    #[error("token field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("expiry `{0}` is not an integer")]
    BadExpiry(String),
}

/// A decoded QR token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrToken {
    pub class_id: String,
    pub session_code: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl QrToken {
    /// Parses a scanned token.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let fields: Vec<&str> = raw.split(SEPARATOR).collect();
        let [class_id, session_code, expires_at] = fields.as_slice() else {
            return Err(TokenError::FieldCount(fields.len()));
        };
        if class_id.is_empty() {
            return Err(TokenError::EmptyField("classId"));
        }
        if session_code.is_empty() {
            return Err(TokenError::EmptyField("sessionCode"));
        }
        let expires_at = expires_at
            .parse::<i64>()
            .map_err(|_| TokenError::BadExpiry((*expires_at).to_string()))?;
        Ok(Self {
            class_id: (*class_id).to_string(),
            session_code: (*session_code).to_string(),
            expires_at,
        })
    }

    /// True once `now` is strictly past the token's expiry.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

impl FromStr for QrToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for QrToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.class_id, self.session_code, self.expires_at
        )
    }
}
