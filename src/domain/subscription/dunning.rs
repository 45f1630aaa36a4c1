//! Dunning retry schedule.
//!
//! Failed attempt `n` schedules the next retry `next_retry_delay(n)` later.
//! After `MAX_DUNNING_ATTEMPTS` failures the subscription is suspended.

use chrono::Duration;

/// Failed attempts after which the subscription is suspended.
pub const MAX_DUNNING_ATTEMPTS: u8 = 3;

/// Delay before the retry that follows failed attempt `attempt`.
///
/// Attempt numbers start at 1; 0 is treated as 1.
pub fn next_retry_delay(attempt: u32) -> Duration {
    match attempt {
        0 | 1 => Duration::days(3),
        2 => Duration::days(7),
        _ => Duration::days(14),
    }
}

/// Returns true once `dunning_count` has reached the escalation threshold.
pub fn is_exhausted(dunning_count: u8) -> bool {
    dunning_count >= MAX_DUNNING_ATTEMPTS
}
