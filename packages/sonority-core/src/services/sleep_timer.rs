//! Sleep-timer countdown against an absolute end timestamp.
//!
//! The remaining time is always derived from `end - now`, so a suspended
//! countdown loop catches up on its next tick instead of drifting.

use std::time::Duration;

/// End timestamp (epoch ms) of a timer started at `now_ms`.
#[must_use]
pub fn end_ms(now_ms: u64, duration: Duration) -> u64 {
    now_ms.saturating_add(duration.as_millis() as u64)
}

/// Remaining time, or `None` once the end has been reached.
#[must_use]
pub fn remaining(end_ms: u64, now_ms: u64) -> Option<Duration> {
    (end_ms > now_ms).then(|| Duration::from_millis(end_ms - now_ms))
}

/// Advances a countdown. Returns true when the timer just expired and was cleared.
pub fn tick(end: &mut Option<u64>, now_ms: u64) -> bool {
    match *end {
        Some(e) if remaining(e, now_ms).is_none() => {
            *end = None;
            true
        }
        _ => false,
    }
}

/// Converts a whole number of minutes into a timer duration. 0 means cancel.
#[must_use]
pub fn from_minutes(minutes: Option<u32>) -> Option<Duration> {
    minutes
        .filter(|m| *m > 0)
        .map(|m| Duration::from_secs(u64::from(m) * 60))
}
