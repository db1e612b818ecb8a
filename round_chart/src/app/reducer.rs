use super::event::*;
use super::state::*;
use crate::debug_hooks;
use crate::feed::{ConnectionState, Sample};
use crate::grid::compute_grid;
use crate::session::Session;
use crate::zones::{derive_zones, needs_rederive, zones_range};

/// Apply one event. Returns true when anything visible changed.
pub fn reduce(state: &mut AppState, ev: AppEvent) -> bool {
    match ev {
        AppEvent::Feed(f) => reduce_feed(state, f),
        AppEvent::Timer(t) => reduce_timer(state, t),
        AppEvent::Viewport(v) => reduce_viewport(state, v),
    }
}

fn reduce_feed(state: &mut AppState, ev: FeedEvent) -> bool {
    match ev {
        FeedEvent::Connection(conn) => {
            if state.connection == conn {
                return false;
            }
            state.connection = conn;
            if conn != ConnectionState::Open {
                state.reset_session();
            }
            true
        }
        FeedEvent::Sample(sample) => apply_sample(state, sample),
    }
}

fn apply_sample(state: &mut AppState, sample: Sample) -> bool {
    if !state.is_live() || !sample.price.is_finite() {
        state.samples_rejected += 1;
        return false;
    }

    let now = state.now_ms;
    if state.session.is_none() {
        match Session::new(
            now,
            state.grid.cols,
            state.settings.round.duration_ms,
            state.settings.round.overflow,
        ) {
            Ok(session) => state.session = Some(session),
            Err(err) => {
                tracing::error!(target: "round.advance", %err, "cannot open session");
                return false;
            }
        }
    }
    let Some(session) = state.session.as_mut() else {
        return false;
    };

    let (advance, accepted) = session.apply_sample(sample, now);
    if let Some(adv) = advance.as_ref() {
        debug_hooks::log_round_advance(adv);
    }
    if !accepted {
        state.samples_rejected += 1;
        return advance.is_some();
    }

    state.samples_accepted += 1;
    state.last_price = Some(sample.price);
    state.push_history(sample);
    rederive_zones(state, sample.price);
    true
}

fn rederive_zones(state: &mut AppState, price: f64) {
    if !needs_rederive(&state.zones, price) {
        return;
    }
    state.zones = derive_zones(price, state.settings.zones.band_width, state.grid.rows);
    if let Some((min, max)) = zones_range(&state.zones) {
        debug_hooks::log_zones(price, min, max);
    }
}

fn reduce_timer(state: &mut AppState, ev: TimerEvent) -> bool {
    match ev {
        TimerEvent::Tick { now_ms } => {
            state.now_ms = now_ms;
            let Some(session) = state.session.as_mut() else {
                return false;
            };
            if let Some(adv) = session.tick(now_ms) {
                debug_hooks::log_round_advance(&adv);
            }
            // progress indicator moves on every tick
            true
        }
    }
}

fn reduce_viewport(state: &mut AppState, ev: ViewportEvent) -> bool {
    match ev {
        ViewportEvent::Resized { width, height } => {
            let width = if width.is_finite() { width.max(0.0) } else { 0.0 };
            let height = if height.is_finite() { height.max(0.0) } else { 0.0 };
            if width == state.viewport_width && height == state.viewport_height {
                return false;
            }
            state.viewport_width = width;
            state.viewport_height = height;

            let (device, grid) = state.settings.grid_for_width(width);
            if device != state.device || grid != state.grid {
                debug_hooks::log_device_change(
                    device.as_str(),
                    grid.cols,
                    grid.rows,
                    grid.stop_at_column,
                );
                state.device = device;
                state.grid = grid;
                state.reset_session();
            }

            state.layout = compute_grid(width, height, grid.cols, grid.rows);
            debug_hooks::log_grid_layout(
                width,
                height,
                grid.cols,
                grid.rows,
                state.layout.cell_size,
                state.layout.gap,
            );
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ChartSettings;

    fn live_state() -> AppState {
        let mut state = AppState::new(ChartSettings::default()).unwrap();
        reduce(
            &mut state,
            AppEvent::Viewport(ViewportEvent::Resized {
                width: 1200.0,
                height: 600.0,
            }),
        );
        reduce(
            &mut state,
            AppEvent::Feed(FeedEvent::Connection(ConnectionState::Open)),
        );
        state
    }

    fn tick(state: &mut AppState, now_ms: i64) -> bool {
        reduce(state, AppEvent::Timer(TimerEvent::Tick { now_ms }))
    }

    fn sample(state: &mut AppState, timestamp: i64, price: f64) -> bool {
        reduce(
            state,
            AppEvent::Feed(FeedEvent::Sample(Sample { timestamp, price })),
        )
    }

    #[test]
    fn first_sample_opens_session_at_clock() {
        let mut state = live_state();
        tick(&mut state, 5_000);
        assert!(state.session.is_none());
        assert!(sample(&mut state, 5_000, 150.0));
        let session = state.session.as_ref().unwrap();
        assert_eq!(session.active().start_time, 5_000);
        assert_eq!(session.cols(), 8);
        assert_eq!(state.zones.len(), 4);
    }

    #[test]
    fn samples_ignored_unless_open() {
        let mut state = AppState::new(ChartSettings::default()).unwrap();
        assert!(!sample(&mut state, 1_000, 150.0));
        assert!(state.session.is_none());
        assert_eq!(state.samples_rejected, 1);
    }

    #[test]
    fn disconnect_drops_session() {
        let mut state = live_state();
        tick(&mut state, 1_000);
        sample(&mut state, 1_000, 150.0);
        assert!(state.session.is_some());
        reduce(
            &mut state,
            AppEvent::Feed(FeedEvent::Connection(ConnectionState::Closed)),
        );
        assert!(state.session.is_none());
        assert!(state.history.is_empty());
    }

    #[test]
    fn zones_follow_price_out_of_range() {
        let mut state = live_state();
        tick(&mut state, 0);
        sample(&mut state, 0, 150.0);
        let before = state.zones.clone();
        sample(&mut state, 1_000, 150.05);
        assert_eq!(state.zones, before);
        sample(&mut state, 2_000, 151.0);
        assert_ne!(state.zones, before);
        assert!(!needs_rederive(&state.zones, 151.0));
    }

    #[test]
    fn history_is_bounded() {
        let mut state = live_state();
        state.settings.max_data_points = 5;
        tick(&mut state, 0);
        for i in 0..12 {
            sample(&mut state, i * 100, 150.0 + i as f64 * 0.01);
        }
        assert_eq!(state.history.len(), 5);
        assert_eq!(state.history.front().unwrap().timestamp, 700);
    }

    #[test]
    fn device_change_resets_but_same_class_resize_does_not() {
        let mut state = live_state();
        tick(&mut state, 0);
        sample(&mut state, 0, 150.0);

        reduce(
            &mut state,
            AppEvent::Viewport(ViewportEvent::Resized {
                width: 1300.0,
                height: 650.0,
            }),
        );
        assert!(state.session.is_some());

        reduce(
            &mut state,
            AppEvent::Viewport(ViewportEvent::Resized {
                width: 800.0,
                height: 650.0,
            }),
        );
        assert!(state.session.is_none());
        assert_eq!(state.grid.cols, 6);
        assert_eq!(state.layout.cells.len(), 24);
    }

    #[test]
    fn same_size_resize_is_not_a_change() {
        let mut state = live_state();
        assert!(!reduce(
            &mut state,
            AppEvent::Viewport(ViewportEvent::Resized {
                width: 1200.0,
                height: 600.0,
            }),
        ));
    }
}
