//! Jittered backoff for background pollers.

use rand::Rng;
use std::time::Duration;

/// Extra pause after `failures` consecutive failed polls: `base` doubled per
/// failure, capped at `max`, plus up to 10% jitter. Zero failures never wait.
pub fn poll_backoff(failures: u32, base: Duration, max: Duration) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let delay_ms = base_ms
        .saturating_mul(2u64.saturating_pow(failures - 1))
        .min(max.as_millis() as u64);

    // Jitter keeps the listeners of both currencies from hitting shared
    // explorers in lockstep.
    let jitter_range = delay_ms / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}
