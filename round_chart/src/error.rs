use thiserror::Error;

/// Setup-time failures. Surfaced to the caller before the first draw.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid needs at least one column")]
    ZeroColumns,
    #[error("grid needs at least one row")]
    ZeroRows,
    #[error("stop column {stop} is outside 1..={cols}")]
    StopColumnOutOfRange { stop: u32, cols: u32 },
    #[error("price scale must be a positive finite number, got {0}")]
    NonPositiveScale(f64),
    #[error("round duration must be positive, got {0}ms")]
    InvalidRoundDuration(i64),
}

/// Feed-side failures. Recovered inside the adapter, never thrown at the renderer.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed frame {frame:?}: {reason}")]
    Malformed { frame: String, reason: &'static str },
    #[error("http status {0}")]
    Http(u16),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Transport(err.to_string())
    }
}
