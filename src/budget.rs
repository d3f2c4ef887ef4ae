// src/budget.rs

//! Soft/hard time budgets for units of remote work.
//!
//! - The *soft* limit is cooperative: work holds a [`SoftDeadline`] and calls
//!   [`SoftDeadline::check`] before every remote command and at the top of
//!   every loop over remote output.
//! - The *hard* limit is enforced by the scheduler, which drops the unit's
//!   future when it elapses (see `engine::unit`).

use std::time::Duration;

use tokio::time::Instant;

use crate::errors::{DaqError, Result};

/// Pair of time budgets declared by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub soft: Duration,
    pub hard: Duration,
}

impl Budget {
    /// Longest budget any operation may declare.
    pub const MAX: Duration = Duration::from_secs(24 * 60 * 60);

    pub const fn secs(soft: u64, hard: u64) -> Self {
        Self {
            soft: Duration::from_secs(soft),
            hard: Duration::from_secs(hard),
        }
    }

    pub fn new(soft: Duration, hard: Duration) -> Result<Self> {
        if soft.is_zero() || hard.is_zero() {
            return Err(DaqError::ConfigError(
                "time budgets must be greater than zero".to_string(),
            ));
        }
        if hard > Self::MAX {
            return Err(DaqError::ConfigError(format!(
                "hard budget {hard:?} exceeds the {:?} maximum",
                Self::MAX
            )));
        }
        if soft > hard {
            return Err(DaqError::ConfigError(format!(
                "soft budget {soft:?} exceeds hard budget {hard:?}"
            )));
        }
        Ok(Self { soft, hard })
    }
}

/// Cooperative cancellation point for one unit of work.
#[derive(Debug, Clone)]
pub struct SoftDeadline {
    at: Instant,
    limit: Duration,
}

impl SoftDeadline {
    /// Start the clock now.
    pub fn starting_now(limit: Duration) -> Self {
        let now = Instant::now();
        // Saturate: a limit past the clock's range never expires.
        let at = now
            .checked_add(limit)
            .unwrap_or_else(|| now + Budget::MAX * 365);
        Self { at, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Returns `Err(Timeout)` once the soft limit has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(DaqError::Timeout(self.limit))
        } else {
            Ok(())
        }
    }

    /// Resolves when the soft limit passes.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.at).await;
    }

    /// Run `fut`, giving up with `Err(Timeout)` if the soft limit passes first.
    pub async fn bound<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            res = fut => res,
            _ = self.expired() => Err(DaqError::Timeout(self.limit)),
        }
    }
}
