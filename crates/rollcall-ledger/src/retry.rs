// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Jittered exponential backoff.

use std::time::Duration;

use rand::Rng;
use rollcall_config::LedgerConfig;

/// Backoff schedule for transient ledger failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never zero.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction of each delay randomly added or subtracted.
    pub jitter_pct: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_pct: f64) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_pct: if jitter_pct.is_nan() {
                0.0
            } else {
                jitter_pct.clamp(0.0, 1.0)
            },
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.base_backoff_ms,
            config.max_backoff_ms,
            config.jitter_pct,
        )
    }

    /// No waiting and a single attempt. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, 1, 1, 0.0)
    }

    /// Un-jittered delay before retry number `attempt + 1`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }

    /// Delay with jitter applied. Stays within `base * (1 ± jitter_pct)`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt).as_millis() as u64;
        if self.jitter_pct == 0.0 {
            return Duration::from_millis(delay);
        }
        let spread = (delay as f64 * self.jitter_pct) as i64;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(delay.saturating_add_signed(delta))
    }

    /// Runs `op` until it succeeds, `retryable` says no, or attempts run out.
    pub async fn retry_when<F, Fut, T, E>(
        &self,
        mut op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !retryable(&err) {
                        return Err(err);
                    }
                    tokio::time::sleep(self.next_delay(attempt - 1)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn new_clamps_inputs() {
        let policy = RetryPolicy::new(0, 0, 0, 3.0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay_ms, 1);
        assert_eq!(policy.max_delay_ms, 1);
        assert_eq!(policy.jitter_pct, 1.0);
        assert_eq!(RetryPolicy::new(1, 1, 1, f64::NAN).jitter_pct, 0.0);
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy::new(6, 100, 500, 0.0);
        let delays: Vec<u128> = (0..5).map(|a| policy.next_delay(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let policy = RetryPolicy::new(5, 1_000, 8_000, 0.25);
        for attempt in 0..4 {
            let base = policy.base_delay(attempt).as_millis() as u64;
            for _ in 0..50 {
                let d = policy.next_delay(attempt).as_millis() as u64;
                assert!(d >= base - base / 4 && d <= base + base / 4, "{d} vs {base}");
            }
        }
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::new(5, 250, 5_000, 0.0);
        assert_eq!(policy.base_delay(200), Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_until_success() {
        let policy = RetryPolicy::new(4, 10, 10, 0.0);
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<&str, &str> = policy
            .retry_when(
                |attempt| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        if attempt < 2 { Err("busy") } else { Ok("ok") }
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_non_retryable_error() {
        let policy = RetryPolicy::new(5, 10, 10, 0.0);
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), &str> = policy
            .retry_when(
                |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err("reverted")
                    }
                },
                |e| *e != "reverted",
            )
            .await;
        assert_eq!(result, Err("reverted"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, 10, 10, 0.0);
        let calls = Arc::new(AtomicU32::new(0));
        let result: Result<(), &str> = policy
            .retry_when(
                |_| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err("down")
                    }
                },
                |_| true,
            )
            .await;
        assert_eq!(result, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
