// round_chart/src/main.rs
//
// Desktop viewer: feed on a tokio runtime, reducer + renderer on the UI
// thread, draw commands painted onto the central panel.

use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use eframe::egui;
use tokio::runtime::Runtime;

use round_chart::app::{AppEvent, AppRuntime, ViewportEvent};
use round_chart::feed::{self, FeedHandle};
use round_chart::settings::Persistence;
use round_chart::{debug_hooks, now_ms, surface};

struct ChartApp {
    runtime: AppRuntime,
    rx: Receiver<AppEvent>,
    feed: FeedHandle,
    repaint_every: Duration,
}

impl ChartApp {
    fn drain_feed(&mut self) {
        while let Ok(ev) = self.rx.try_recv() {
            self.runtime.handle_event(ev);
        }
    }
}

impl eframe::App for ChartApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_feed();
        self.runtime.tick_if_needed(now_ms());

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let rect = ui.available_rect_before_wrap();
                self.runtime.handle_event(AppEvent::Viewport(ViewportEvent::Resized {
                    width: rect.width(),
                    height: rect.height(),
                }));
                let commands = self.runtime.render_if_dirty();
                surface::paint(ui.painter(), rect.min, commands);
            });

        ctx.request_repaint_after(self.repaint_every);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.feed.disconnect();
    }
}

fn main() -> Result<()> {
    debug_hooks::init_tracing();
    feed::install_rustls_provider();

    let store = Persistence::new()?;
    let mut settings = store.load();
    settings.apply_env();
    tracing::info!(
        path = ?store.config_path(),
        feed = ?settings.feed.kind,
        url = %settings.feed.url,
        "settings loaded"
    );

    let runtime = AppRuntime::new(settings.clone()).context("invalid chart settings")?;

    let rt = Runtime::new().context("tokio runtime")?;
    let (tx, rx) = mpsc::channel::<AppEvent>();
    let feed = feed::connect(&settings.feed, tx, rt.handle());

    let app = ChartApp {
        runtime,
        rx,
        feed,
        repaint_every: Duration::from_millis(settings.round.tick_ms.max(16)),
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 600.0])
            .with_title("Round Chart"),
        ..Default::default()
    };
    eframe::run_native(
        "Round Chart",
        native_options,
        Box::new(move |_cc| Box::new(app)),
    )
    .map_err(|e| anyhow!("eframe error: {e}"))?;

    drop(rt);
    Ok(())
}
