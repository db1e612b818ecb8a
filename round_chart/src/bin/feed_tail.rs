// round_chart/src/bin/feed_tail.rs
//
// Headless runner. Connects the configured feed, drives the same reducer on
// the round clock and logs round transitions until Ctrl-C or until the feed
// gives up reconnecting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::runtime::Runtime;
use tracing::info;

use round_chart::app::{AppEvent, AppRuntime, FeedEvent, ViewportEvent};
use round_chart::feed::{self, ConnectionState};
use round_chart::settings::Persistence;
use round_chart::{debug_hooks, now_ms};

const HEADLESS_WIDTH: f32 = 1200.0;
const HEADLESS_HEIGHT: f32 = 600.0;
const SUMMARY_EVERY_MS: i64 = 5_000;

fn main() -> Result<()> {
    debug_hooks::init_tracing();
    feed::install_rustls_provider();

    let store = Persistence::new()?;
    let mut settings = store.load();
    settings.apply_env();

    let mut runtime = AppRuntime::new(settings.clone()).context("invalid chart settings")?;
    runtime.handle_event(AppEvent::Viewport(ViewportEvent::Resized {
        width: HEADLESS_WIDTH,
        height: HEADLESS_HEIGHT,
    }));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| anyhow!("ctrl-c handler: {e}"))?;
    }

    let rt = Runtime::new().context("tokio runtime")?;
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let handle = feed::connect(&settings.feed, tx, rt.handle());
    info!(feed = ?settings.feed.kind, id = %settings.feed.feed_id, "feed_tail started");

    let tick = Duration::from_millis(settings.round.tick_ms.max(1));
    let mut last_summary = now_ms();

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(tick) {
            Ok(ev) => {
                let terminal = matches!(
                    ev,
                    AppEvent::Feed(FeedEvent::Connection(ConnectionState::Disconnected))
                );
                runtime.handle_event(ev);
                if terminal {
                    info!("feed disconnected for good; exiting");
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let now = now_ms();
        runtime.tick_if_needed(now);

        if now - last_summary >= SUMMARY_EVERY_MS {
            last_summary = now;
            let state = &runtime.state;
            match state.session.as_ref() {
                Some(session) => info!(
                    round = session.round_number(),
                    column = session.column_index(),
                    samples = session.active().samples.len(),
                    remaining_s = session.remaining_secs(now),
                    last_price = ?state.last_price,
                    "round status"
                ),
                None => info!(connection = state.connection.as_str(), "waiting for data"),
            }
        }
    }

    handle.disconnect();
    drop(rt);
    info!(
        accepted = runtime.state.samples_accepted,
        rejected = runtime.state.samples_rejected,
        "feed_tail stopped"
    );
    Ok(())
}
