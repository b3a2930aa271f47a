use std::time::Duration;

/// Upper bound for a single backoff sleep.
pub const MAX_BACKOFF_SECS: u64 = 30;

/// What the executor should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Sleep for the given delay, then start the next attempt.
    RetryAfter(Duration),
    /// The retry budget is exhausted; report the last error.
    GiveUp,
}

/// Backoff delay after the failed attempt `attempt` (0-indexed).
///
/// Exponential: 2s, 4s, 8s, 16s, then capped at 30s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_add(1);
    let secs = if exponent >= 6 {
        MAX_BACKOFF_SECS
    } else {
        (1u64 << exponent).min(MAX_BACKOFF_SECS)
    };
    Duration::from_secs(secs)
}

/// Decide the next step after attempt `attempt` failed, given a budget of
/// `max_retries` retries (so `max_retries + 1` attempts in total).
pub fn next_action(attempt: u32, max_retries: u32) -> RetryAction {
    if attempt >= max_retries {
        RetryAction::GiveUp
    } else {
        RetryAction::RetryAfter(backoff_delay(attempt))
    }
}
