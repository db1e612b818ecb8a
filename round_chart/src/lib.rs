pub mod app;
pub mod debug_hooks;
pub mod error;
pub mod feed;
pub mod grid;
pub mod mapper;
pub mod session;
pub mod settings;
pub mod surface;
pub mod zones;

pub use error::{ConfigError, FeedError};

/// unix milliseconds, local wall clock
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
