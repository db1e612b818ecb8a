use crate::feed::{ConnectionState, Sample};

#[derive(Debug, Clone)]
pub enum AppEvent {
    Feed(FeedEvent),
    Timer(TimerEvent),
    Viewport(ViewportEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connection(ConnectionState),
    Sample(Sample),
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    /// Fixed-interval clock tick, wall clock milliseconds.
    Tick { now_ms: i64 },
}

#[derive(Debug, Clone)]
pub enum ViewportEvent {
    Resized { width: f32, height: f32 },
}
