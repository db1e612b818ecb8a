pub mod event;
pub mod reducer;
pub mod render;
pub mod state;

pub use event::*;
pub use reducer::reduce;
pub use render::DrawCommand;
pub use state::*;

use crate::error::ConfigError;
use crate::settings::ChartSettings;

/// Event loop glue: reducer in, draw commands out. The draw surface stays
/// with the caller.
pub struct AppRuntime {
    pub state: AppState,
    dirty: bool,
    last_tick_ms: i64,
    frame: Vec<DrawCommand>,
}

impl AppRuntime {
    pub fn new(settings: ChartSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            state: AppState::new(settings)?,
            dirty: true,
            last_tick_ms: i64::MIN,
            frame: Vec::new(),
        })
    }

    pub fn handle_event(&mut self, ev: AppEvent) {
        self.handle_event_at(ev, crate::now_ms());
    }

    /// Samples are preceded by a clock evaluation at `now_ms`, so a round that
    /// expired since the last tick is archived before the sample lands.
    pub fn handle_event_at(&mut self, ev: AppEvent, now_ms: i64) {
        if matches!(ev, AppEvent::Feed(FeedEvent::Sample(_))) {
            self.clock(now_ms);
        }
        if reducer::reduce(&mut self.state, ev) {
            self.dirty = true;
        }
    }

    /// Fire a timer tick when the configured interval has passed.
    pub fn tick_if_needed(&mut self, now_ms: i64) {
        let every = self.state.settings.round.tick_ms.max(1) as i64;
        if now_ms.saturating_sub(self.last_tick_ms) >= every {
            self.clock(now_ms);
        }
    }

    fn clock(&mut self, now_ms: i64) {
        self.last_tick_ms = now_ms;
        if reducer::reduce(&mut self.state, AppEvent::Timer(TimerEvent::Tick { now_ms })) {
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current frame, re-rendered only when state changed.
    pub fn render_if_dirty(&mut self) -> &[DrawCommand] {
        if self.dirty {
            self.frame = render::render(&self.state);
            self.dirty = false;
        }
        &self.frame
    }
}
