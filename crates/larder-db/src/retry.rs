//! # Write Contention Retry
//!
//! SQLite serialises writers. A write transaction that loses the race gets
//! `SQLITE_BUSY` (or `SQLITE_LOCKED`) even with a busy timeout, most often
//! when a read snapshot tries to upgrade to a write.
//!
//! ## Retry Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   attempt 1 ──► Ok ─────────────────────────────────────► return Ok    │
//! │       │                                                                 │
//! │       ├──► Err(structural) ─────────────────────────────► return Err   │
//! │       │                                                                 │
//! │       └──► Err(Busy) ──► sleep(backoff) ──► attempt 2 ──► ...          │
//! │                                                 │                       │
//! │                          attempts exhausted ────┴──► ContentionExhausted│
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The retried closure must open its own transaction, so a failed attempt
//! leaves nothing behind.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Bounds for retrying transient write contention.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Delay before the second attempt.
    pub initial_interval: Duration,

    /// Upper bound for a single delay.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_interval: Duration::from_millis(20),
            max_interval: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the attempt budget.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `operation` until it succeeds, fails structurally, or the policy's
/// attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, name: &str, mut operation: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() => {
                if attempt >= max_attempts {
                    warn!(operation = name, attempts = attempt, error = %err, "Retries exhausted");
                    return Err(DbError::ContentionExhausted { attempts: attempt });
                }

                let delay = backoff.next_backoff().unwrap_or(policy.max_interval);
                warn!(
                    operation = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Write contention, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
