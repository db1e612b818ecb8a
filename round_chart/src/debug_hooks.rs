// debug_hooks.rs - one function per log topic, routed through tracing targets.
//
// Enable with RUST_LOG, e.g. `RUST_LOG=info,feed.sample=debug`.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::feed::ConnectionState;
use crate::session::RoundAdvance;

static SAMPLE_COUNT: AtomicU64 = AtomicU64::new(0);
static MALFORMED_COUNT: AtomicU64 = AtomicU64::new(0);
static SETTLE_COUNT: AtomicU64 = AtomicU64::new(0);

/// First 10 events, then every 50th.
fn throttled(counter: &AtomicU64) -> Option<u64> {
    let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
    (n <= 10 || n % 50 == 0).then_some(n)
}

/// Install the fmt subscriber once per process. Later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

pub fn log_connect(url: &str, attempt: usize) {
    info!(target: "feed.connect", url, attempt, "connecting");
}

pub fn log_connection_state(state: ConnectionState) {
    info!(target: "feed.connect", state = state.as_str(), "connection state");
}

pub fn log_transport_error(err: &dyn std::fmt::Display) {
    warn!(target: "feed.connect", %err, "transport error");
}

pub fn log_sample(timestamp: i64, price: f64) {
    if let Some(n) = throttled(&SAMPLE_COUNT) {
        debug!(target: "feed.sample", n, timestamp, price, "sample");
    }
}

pub fn log_malformed(frame: &str, reason: &str) {
    if let Some(n) = throttled(&MALFORMED_COUNT) {
        warn!(target: "feed.malformed", n, frame, reason, "dropped frame");
    }
}

pub fn log_settle_drop(since_open_ms: i64) {
    if let Some(n) = throttled(&SETTLE_COUNT) {
        debug!(target: "feed.settle", n, since_open_ms, "discarding while settling");
    }
}

pub fn log_backoff(attempt: usize, delay_ms: u64) {
    info!(target: "feed.backoff", attempt, delay_ms, "reconnect scheduled");
}

pub fn log_backoff_exhausted(attempts: usize) {
    warn!(target: "feed.backoff", attempts, "reconnect attempts exhausted; giving up");
}

pub fn log_round_advance(adv: &RoundAdvance) {
    info!(
        target: "round.advance",
        archived_round = adv.archived_round,
        archived_column = adv.archived_column,
        samples = adv.archived_samples,
        next_round = adv.next_round,
        next_column = adv.next_column,
        evicted = adv.evicted,
        "round archived"
    );
}

pub fn log_grid_layout(width: f32, height: f32, cols: u32, rows: u32, cell_size: f32, gap: f32) {
    debug!(target: "grid.layout", width, height, cols, rows, cell_size, gap, "grid recomputed");
}

pub fn log_device_change(class: &str, cols: u32, rows: u32, stop: u32) {
    info!(target: "grid.layout", class, cols, rows, stop, "device class changed; session reset");
}

pub fn log_zones(center: f64, min: f64, max: f64) {
    debug!(target: "zones.rederive", center, min, max, "zones re-derived");
}
