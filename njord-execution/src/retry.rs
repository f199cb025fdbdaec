use crate::error::VenueError;
use std::{future::Future, time::Duration};
use tracing::warn;

/// Default retry policy for venue calls.
pub const VENUE_RETRY_POLICY: RetryPolicy = RetryPolicy {
    backoff_ms_initial: 250,
    backoff_multiplier: 2,
    backoff_ms_max: 10_000,
    max_attempts: 4,
};

/// Bounded exponential backoff: `initial * multiplier^(attempt-1)`, capped.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RetryPolicy {
    pub backoff_ms_initial: u64,
    pub backoff_multiplier: u64,
    pub backoff_ms_max: u64,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Backoff before re-attempting after failed attempt number `attempt` (1-based).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        self.backoff_ms_initial
            .saturating_mul(self.backoff_multiplier.saturating_pow(attempt.saturating_sub(1)))
            .min(self.backoff_ms_max)
    }
}

/// Run `op` under `policy`, retrying transient failures.
///
/// A venue-provided `Retry-After` hint overrides the computed backoff for that
/// attempt. Non-transient errors and exhausted attempts surface the last error.
pub async fn retry_with<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, VenueError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VenueError>>,
{
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                let backoff_ms = error
                    .retry_after_ms()
                    .unwrap_or_else(|| policy.backoff_ms(attempt));

                warn!(%error, attempt, backoff_ms, "venue call failed - backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
