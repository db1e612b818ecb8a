//! Price feed adapter.
//!
//! A transport (`ws`, `http` or `dummy`) only moves frames. Everything else
//! lives here: frame parsing, scaling, the settle window after each open,
//! connection-state publishing and reconnect with capped backoff. Events go
//! to the app over the same `std::sync::mpsc` channel the UI drains.

pub mod backoff;
pub mod dummy;
pub mod frame;
pub mod http;
pub mod ws;

pub use ws::install_rustls_provider;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::app::{AppEvent, FeedEvent};
use crate::debug_hooks;
use crate::error::FeedError;
use crate::settings::FeedSettings;

/// One normalized observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// unix milliseconds
    pub timestamp: i64,
    pub price: f64,
}

/// Wire pair as received: `[unixSeconds, scaledPrice]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTick {
    pub unix_seconds: f64,
    pub scaled_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    #[default]
    Ws,
    Http,
    Dummy,
}

impl FeedKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ws" | "websocket" => Some(FeedKind::Ws),
            "http" | "https" => Some(FeedKind::Http),
            "dummy" => Some(FeedKind::Dummy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
    /// Terminal: reconnect attempts are exhausted.
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

fn malformed(frame: &str, reason: &'static str) -> FeedError {
    FeedError::Malformed {
        frame: frame.to_string(),
        reason,
    }
}

/// Parse a `[unixSeconds, scaledPrice]` JSON pair.
pub fn parse_frame(frame: &str) -> Result<RawTick, FeedError> {
    let value: Value = serde_json::from_str(frame).map_err(|_| malformed(frame, "not json"))?;
    let pair = value
        .as_array()
        .ok_or_else(|| malformed(frame, "not an array"))?;
    if pair.len() != 2 {
        return Err(malformed(frame, "expected two elements"));
    }
    let unix_seconds = pair[0]
        .as_f64()
        .ok_or_else(|| malformed(frame, "timestamp is not a number"))?;
    let scaled_price = pair[1]
        .as_f64()
        .ok_or_else(|| malformed(frame, "price is not a number"))?;
    Ok(RawTick {
        unix_seconds,
        scaled_price,
    })
}

/// Seconds -> milliseconds, divide by `scale`, round to `decimals` places.
pub fn normalize(raw: RawTick, scale: f64, decimals: Option<u32>) -> Result<Sample, FeedError> {
    let label = || format!("[{}, {}]", raw.unix_seconds, raw.scaled_price);
    if !raw.unix_seconds.is_finite() || !raw.scaled_price.is_finite() {
        return Err(malformed(&label(), "non-finite value"));
    }
    if raw.unix_seconds < 0.0 {
        return Err(malformed(&label(), "negative timestamp"));
    }
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(malformed(&label(), "invalid scale"));
    }

    let mut price = raw.scaled_price / scale;
    if let Some(d) = decimals {
        let factor = 10f64.powi(d as i32);
        price = (price * factor).round() / factor;
    }
    if !price.is_finite() {
        return Err(malformed(&label(), "non-finite price"));
    }
    Ok(Sample {
        timestamp: (raw.unix_seconds * 1000.0).round() as i64,
        price,
    })
}

/// Rejects samples dated more than `max_skew_ms` ahead of `now`. A feed that
/// sends milliseconds where seconds are expected lands here.
pub fn check_skew(sample: Sample, now: i64, max_skew_ms: i64) -> Result<Sample, FeedError> {
    if sample.timestamp.saturating_sub(now) > max_skew_ms.max(0) {
        let label = format!("[{}, {}]", sample.timestamp / 1000, sample.price);
        return Err(malformed(&label, "timestamp ahead of local clock"));
    }
    Ok(sample)
}

/// Drops samples for `settle_ms` after every open, on the local clock.
#[derive(Debug, Clone, Copy)]
pub struct SettleGate {
    settle_ms: i64,
    opened_at: Option<i64>,
}

impl SettleGate {
    pub fn new(settle_ms: i64) -> Self {
        Self {
            settle_ms: settle_ms.max(0),
            opened_at: None,
        }
    }

    pub fn open(&mut self, now: i64) {
        self.opened_at = Some(now);
    }

    /// `Err(ms since open)` while still settling.
    pub fn admit(&self, now: i64) -> Result<(), i64> {
        match self.opened_at {
            Some(t) if now - t < self.settle_ms => Err(now - t),
            _ => Ok(()),
        }
    }
}

/// Endpoint for one connect attempt. `from` keeps the server from replaying
/// history older than the attempt.
pub fn feed_url(settings: &FeedSettings, from_unix_secs: i64) -> String {
    let base = settings.url.trim_end_matches('/');
    let mut url = match settings.kind {
        FeedKind::Ws => format!("{base}/ws/feed/{}", settings.feed_id),
        FeedKind::Http => format!("{base}/feed/{}", settings.feed_id),
        FeedKind::Dummy => format!("dummy://{}", settings.feed_id),
    };
    if settings.append_from_param && settings.kind != FeedKind::Dummy {
        let sep = if url.contains('?') { '&' } else { '?' };
        url.push(sep);
        url.push_str(&format!("from={from_unix_secs}"));
    }
    url
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Publish {
    Delivered,
    HungUp,
    Stopped,
}

/// Connection state shared by the feed task and its handle. Publishing and
/// stopping both run under the watch channel's lock, so once `stop` returns
/// the task can no longer overwrite `Closed` or queue a state event behind it.
struct StateCell {
    tx: watch::Sender<ConnectionState>,
    stopped: AtomicBool,
}

impl StateCell {
    fn new() -> (Arc<Self>, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        let cell = Arc::new(Self {
            tx,
            stopped: AtomicBool::new(false),
        });
        (cell, rx)
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn publish(&self, state: ConnectionState, events: &Sender<AppEvent>) -> Publish {
        let mut outcome = Publish::Stopped;
        self.tx.send_if_modified(|current| {
            if self.is_stopped() {
                return false;
            }
            *current = state;
            outcome = match events.send(AppEvent::Feed(FeedEvent::Connection(state))) {
                Ok(()) => Publish::Delivered,
                Err(_) => Publish::HungUp,
            };
            true
        });
        outcome
    }

    /// Mark the feed stopped and publish `Closed`, unless it already gave up.
    fn stop(&self, events: &Sender<AppEvent>) -> bool {
        self.tx.send_if_modified(|current| {
            self.stopped.store(true, Ordering::SeqCst);
            if *current == ConnectionState::Disconnected {
                return false;
            }
            *current = ConnectionState::Closed;
            let _ = events.send(AppEvent::Feed(FeedEvent::Connection(ConnectionState::Closed)));
            true
        })
    }
}

/// Transport-facing sink: turns frames into app events.
pub(crate) struct Publisher {
    tx: Sender<AppEvent>,
    state: Arc<StateCell>,
    gate: SettleGate,
    scale: f64,
    decimals: Option<u32>,
    max_skew_ms: i64,
    opened: bool,
    hung_up: bool,
}

impl Publisher {
    fn new(tx: Sender<AppEvent>, state: Arc<StateCell>, settings: &FeedSettings) -> Self {
        Self {
            tx,
            state,
            gate: SettleGate::new(settings.settle_ms),
            scale: settings.price_scale,
            decimals: settings.price_decimals,
            max_skew_ms: settings.max_future_skew_ms,
            opened: false,
            hung_up: false,
        }
    }

    fn send(&mut self, event: FeedEvent) {
        if self.state.is_stopped() || self.tx.send(AppEvent::Feed(event)).is_err() {
            self.hung_up = true;
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        match self.state.publish(state, &self.tx) {
            Publish::Delivered => debug_hooks::log_connection_state(state),
            Publish::HungUp | Publish::Stopped => self.hung_up = true,
        }
    }

    /// Transport reached the open state.
    pub(crate) fn open(&mut self) {
        self.opened = true;
        self.gate.open(crate::now_ms());
        self.set_state(ConnectionState::Open);
    }

    /// Handle one complete frame. Returns false once nobody is listening.
    pub(crate) fn frame(&mut self, frame: &str) -> bool {
        let now = crate::now_ms();
        let sample = match parse_frame(frame)
            .and_then(|raw| normalize(raw, self.scale, self.decimals))
            .and_then(|s| check_skew(s, now, self.max_skew_ms))
        {
            Ok(s) => s,
            Err(FeedError::Malformed { frame, reason }) => {
                debug_hooks::log_malformed(&frame, reason);
                return !self.hung_up;
            }
            Err(err) => {
                debug_hooks::log_transport_error(&err);
                return !self.hung_up;
            }
        };
        if let Err(since) = self.gate.admit(now) {
            debug_hooks::log_settle_drop(since);
            return !self.hung_up;
        }
        debug_hooks::log_sample(sample.timestamp, sample.price);
        self.send(FeedEvent::Sample(sample));
        !self.hung_up
    }

    pub(crate) fn hung_up(&self) -> bool {
        self.hung_up
    }
}

/// Handle to a running feed task.
pub struct FeedHandle {
    state: watch::Receiver<ConnectionState>,
    cell: Arc<StateCell>,
    tx: Sender<AppEvent>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Stop the feed, cancelling any in-flight connect or backoff sleep.
    /// `Closed` is the last state published, even if the task is mid-poll.
    pub fn disconnect(&self) {
        if self.cell.stop(&self.tx) {
            debug_hooks::log_connection_state(ConnectionState::Closed);
        }
        self.task.abort();
    }

    /// Subscribe to connection-state changes.
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start the feed on `rt`. Never blocks; events arrive on `tx`.
pub fn connect(
    settings: &FeedSettings,
    tx: Sender<AppEvent>,
    rt: &tokio::runtime::Handle,
) -> FeedHandle {
    let (cell, state) = StateCell::new();
    let publisher = Publisher::new(tx.clone(), cell.clone(), settings);
    let task = rt.spawn(run_feed(settings.clone(), publisher));
    FeedHandle {
        state,
        cell,
        tx,
        task,
    }
}

fn fresh_backoff(settings: &FeedSettings) -> impl Iterator<Item = Duration> {
    backoff::reconnect_backoff(
        Duration::from_millis(settings.reconnect_min_ms),
        Duration::from_millis(settings.reconnect_max_ms),
        settings.max_reconnect_attempts,
    )
}

async fn run_feed(settings: FeedSettings, mut publisher: Publisher) {
    let mut delays = fresh_backoff(&settings);
    let mut attempt: usize = 0;

    loop {
        attempt += 1;
        publisher.opened = false;
        publisher.set_state(ConnectionState::Connecting);
        if publisher.hung_up() {
            return;
        }

        let url = feed_url(&settings, crate::now_ms() / 1000);
        debug_hooks::log_connect(&url, attempt);

        let result = match settings.kind {
            FeedKind::Ws => ws::run(&url, &mut publisher).await,
            FeedKind::Http => http::run(&url, &mut publisher).await,
            FeedKind::Dummy => dummy::run(&settings, &mut publisher).await,
        };
        if let Err(err) = result {
            debug_hooks::log_transport_error(&err);
        }

        if publisher.opened {
            delays = fresh_backoff(&settings);
            attempt = 0;
        }
        publisher.set_state(ConnectionState::Closed);
        if publisher.hung_up() {
            return;
        }

        match delays.next() {
            Some(delay) => {
                debug_hooks::log_backoff(attempt, delay.as_millis() as u64);
                tokio::time::sleep(delay).await;
            }
            None => {
                debug_hooks::log_backoff_exhausted(attempt);
                publisher.set_state(ConnectionState::Disconnected);
                return;
            }
        }
    }
}
