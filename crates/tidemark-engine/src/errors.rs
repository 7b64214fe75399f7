//! Retry backoff policy for stream drains.

use std::time::Duration;

use crate::config::types::{BackoffKind, RetryConfig};

const BACKOFF_MAX_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based: the delay after the first
/// failed attempt is `attempt == 1`).
pub(crate) fn compute_backoff(policy: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = policy.backoff_ms;
    let delay_ms = match policy.backoff {
        BackoffKind::Fixed => base_ms,
        BackoffKind::Exponential => {
            let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
            base_ms.saturating_mul(factor)
        }
    };
    Duration::from_millis(delay_ms.min(BACKOFF_MAX_MS))
}
