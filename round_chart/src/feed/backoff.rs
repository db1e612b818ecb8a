use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

/// Reconnect delays: doubling from `min` up to `max`, at most `max_attempts` of them.
/// No jitter, so the sequence is non-decreasing. The iterator running dry is
/// the adapter's cue to give up.
pub fn reconnect_backoff(
    min: Duration,
    max: Duration,
    max_attempts: usize,
) -> impl Iterator<Item = Duration> {
    ExponentialBuilder::default()
        .with_min_delay(min)
        .with_max_delay(max.max(min))
        .with_max_times(max_attempts)
        .build()
}
