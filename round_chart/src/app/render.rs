use super::state::*;
use crate::feed::{ConnectionState, Sample};
use crate::grid::Bounds;
use crate::mapper::{
    map_stop_column, map_time_progress, price_to_y, y_to_price, Point, PriceRange,
    StopColumnWindow,
};
use crate::session::{Round, Session};
use crate::settings::ChartMode;
use crate::zones::{labelled_rows, zones_range};

/// Glyph width as a fraction of font size, used to size labels without a font.
pub const GLYPH_WIDTH_RATIO: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    fn lerp(self, other: Color, t: f32) -> Color {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

pub const BACKGROUND: Color = Color::rgb(0x0B, 0x0B, 0x0F);
pub const CELL_BORDER: Color = Color::rgba(255, 255, 255, 20);
pub const GOLD: Color = Color::rgb(0xFC, 0xE5, 0x7C);
pub const GOLD_ZONE: Color = Color::rgba(0xFC, 0xE5, 0x7C, 77);
pub const GOLD_LABEL: Color = Color::rgba(0xFC, 0xE5, 0x7C, 204);
pub const GOLD_CONNECTOR: Color = Color::rgba(0xFC, 0xE5, 0x7C, 128);
pub const GOLD_HISTORY: Color = Color::rgba(0xFA, 0xE2, 0x79, 140);
pub const GOLD_GLOW: Color = Color::rgba(0xFC, 0xE5, 0x7C, 77);
pub const GOLD_COLUMN: Color = Color::rgba(0xFC, 0xE5, 0x7C, 26);
pub const PROGRESS: Color = Color::rgba(255, 255, 255, 51);
pub const OFFLINE_RED: Color = Color::rgb(0xFF, 0x00, 0x00);
pub const WHITE: Color = Color::rgb(255, 255, 255);
pub const PLACEHOLDER_PANEL: Color = Color::rgba(0x1A, 0x1A, 0x22, 230);
pub const PLACEHOLDER_TEXT: Color = Color::rgba(255, 255, 255, 160);

/// Horizontal multi-stop gradient between `start_x` and `end_x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub start_x: f32,
    pub end_x: f32,
    pub stops: Vec<(f32, Color)>,
}

impl Gradient {
    pub fn gold(start_x: f32, end_x: f32) -> Self {
        Self {
            start_x,
            end_x,
            stops: vec![
                (0.0, Color::rgb(0xFA, 0xE2, 0x79)),
                (0.2, Color::rgb(0xE9, 0xBD, 0x49)),
                (0.4, Color::rgb(0xFC, 0xE5, 0x7C)),
                (0.6, Color::rgb(0xFA, 0xE2, 0x79)),
                (0.8, Color::rgb(0xFB, 0xEB, 0xB0)),
                (1.0, Color::rgb(0xE9, 0xBD, 0x49)),
            ],
        }
    }

    /// Colour at canvas x, clamped to the end stops.
    pub fn color_at(&self, x: f32) -> Color {
        let span = self.end_x - self.start_x;
        let t = if span > 0.0 {
            ((x - self.start_x) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let Some(first) = self.stops.first() else {
            return WHITE;
        };
        if t <= first.0 {
            return first.1;
        }
        for pair in self.stops.windows(2) {
            let (t0, c0) = pair[0];
            let (t1, c1) = pair[1];
            if t <= t1 {
                let local = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };
                return c0.lerp(c1, local);
            }
        }
        self.stops.last().map(|s| s.1).unwrap_or(WHITE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Color),
    Gradient(Gradient),
}

/// Horizontal anchor of a text run; text is always vertically centred on `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear {
        width: f32,
        height: f32,
        color: Color,
    },
    Line {
        from: Point,
        to: Point,
        width: f32,
        color: Color,
        /// (dash, gap) in pixels
        dash: Option<(f32, f32)>,
    },
    Polyline {
        points: Vec<Point>,
        width: f32,
        paint: Paint,
    },
    FillRect {
        bounds: Bounds,
        color: Color,
    },
    StrokeRect {
        bounds: Bounds,
        width: f32,
        color: Color,
    },
    Circle {
        center: Point,
        radius: f32,
        color: Color,
    },
    Text {
        pos: Point,
        text: String,
        size: f32,
        color: Color,
        align: Align,
    },
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_WIDTH_RATIO
}

/// Full repaint of the chart for the current state.
pub fn render(state: &AppState) -> Vec<DrawCommand> {
    let mut out = vec![DrawCommand::Clear {
        width: state.viewport_width,
        height: state.viewport_height,
        color: BACKGROUND,
    }];
    if state.layout.is_empty() {
        return out;
    }

    for cell in &state.layout.cells {
        out.push(DrawCommand::StrokeRect {
            bounds: Bounds {
                left: cell.x,
                right: cell.x + cell.width,
                top: cell.y,
                bottom: cell.y + cell.height,
            },
            width: 1.0,
            color: CELL_BORDER,
        });
    }

    match state.session.as_ref() {
        Some(session) if state.is_live() => {
            match state.mode {
                ChartMode::Rounds => draw_rounds(state, session, &mut out),
                ChartMode::StopColumn => draw_stop_column(state, &mut out),
            }
            draw_round_info(state, session, &mut out);
        }
        _ => draw_placeholder(state, &mut out),
    }

    draw_status(state, &mut out);
    out
}

fn draw_rounds(state: &AppState, session: &Session, out: &mut Vec<DrawCommand>) {
    let layout = &state.layout;
    let range = match zones_range(&state.zones) {
        Some((min, max)) => PriceRange::padded(min, max),
        None => match PriceRange::from_prices(session.all_samples().map(|s| s.price)) {
            Some(r) => r,
            None => return,
        },
    };

    // zone guides, labelled with the zone bands
    for zone in &state.zones {
        if let Some(row) = layout.row_bounds(zone.row_index) {
            push_zone_line(&row, out);
        }
    }
    for zone in labelled_rows(&state.zones) {
        if let Some(row) = layout.row_bounds(zone.row_index) {
            push_zone_label(&row, zone.label.clone(), out);
        }
    }

    let bounds_of = |round: &Round| -> Option<Bounds> {
        let col = session.visual_column(round.column_index)?;
        layout.column_bounds(col)
    };
    let duration = session.duration_ms();

    // archived rounds
    for round in session.archived() {
        let Some(bounds) = bounds_of(round) else {
            continue;
        };
        if round.samples.is_empty() {
            continue;
        }
        let points = map_time_progress(&round.samples, round.start_time, duration, &bounds, &range);
        out.push(DrawCommand::Polyline {
            points,
            width: 2.0,
            paint: Paint::Solid(GOLD_HISTORY),
        });
    }

    // connectors between consecutive rounds
    let rounds: Vec<&Round> = session
        .archived()
        .chain(std::iter::once(session.active()))
        .collect();
    for pair in rounds.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (Some(last), Some(first)) = (a.last(), b.first()) else {
            continue;
        };
        let (Some(ba), Some(bb)) = (bounds_of(a), bounds_of(b)) else {
            continue;
        };
        if bb.left <= ba.right {
            // wrapped back to the first column
            continue;
        }
        out.push(DrawCommand::Line {
            from: Point {
                x: ba.right,
                y: price_to_y(last.price, &range, &ba),
            },
            to: Point {
                x: bb.left,
                y: price_to_y(first.price, &range, &bb),
            },
            width: 1.0,
            color: GOLD_CONNECTOR,
            dash: Some((5.0, 5.0)),
        });
    }

    // active column
    let active = session.active();
    let Some(bounds) = bounds_of(active) else {
        return;
    };
    out.push(DrawCommand::FillRect {
        bounds,
        color: GOLD_COLUMN,
    });
    out.push(DrawCommand::StrokeRect {
        bounds,
        width: 2.0,
        color: GOLD,
    });

    let points = map_time_progress(&active.samples, active.start_time, duration, &bounds, &range);
    if let (Some(head), Some(sample)) = (points.last().copied(), active.last()) {
        out.push(DrawCommand::Polyline {
            points,
            width: 3.0,
            paint: Paint::Gradient(Gradient::gold(0.0, state.viewport_width)),
        });
        push_marker(head, sample, &bounds, out);
    }

    // remaining time under the column
    let label_y = (bounds.bottom + 20.0).min(state.viewport_height - 8.0);
    out.push(DrawCommand::Text {
        pos: Point {
            x: bounds.center_x(),
            y: label_y,
        },
        text: format!("{}s", session.remaining_secs(state.now_ms)),
        size: 12.0,
        color: GOLD,
        align: Align::Center,
    });

    let progress_x = bounds.left + bounds.width() * session.progress(state.now_ms) as f32;
    push_vertical_guide(progress_x, &bounds, out);
}

fn draw_stop_column(state: &AppState, out: &mut Vec<DrawCommand>) {
    let layout = &state.layout;
    let Some(window) = StopColumnWindow::from_layout(layout, state.grid.stop_at_column) else {
        return;
    };
    let visible: Vec<Sample> = {
        let skip = state.history.len().saturating_sub(window.capacity);
        state.history.iter().skip(skip).copied().collect()
    };
    let Some(range) = PriceRange::from_prices(visible.iter().map(|s| s.price)) else {
        return;
    };

    // row guides, labelled with the prices the mapping assigns to each row
    let rows = layout.rows;
    for row in 0..rows {
        let Some(rb) = layout.row_bounds(row) else {
            continue;
        };
        push_zone_line(&rb, out);
        if rows <= 6 || row % 2 == 0 {
            let hi = y_to_price(rb.top, &range, &window.bounds);
            let lo = y_to_price(rb.bottom, &range, &window.bounds);
            push_zone_label(&rb, format!("{lo:.3}-{hi:.3}"), out);
        }
    }

    let points = map_stop_column(&visible, &window, &range);
    let Some(head) = points.last().copied() else {
        return;
    };

    let head_col = (points.len() - 1).min(window.capacity - 1) as u32;
    if let Some(col) = layout.column_bounds(head_col) {
        out.push(DrawCommand::FillRect {
            bounds: col,
            color: GOLD_COLUMN,
        });
        out.push(DrawCommand::StrokeRect {
            bounds: col,
            width: 2.0,
            color: GOLD,
        });
    }

    out.push(DrawCommand::Polyline {
        points,
        width: 3.0,
        paint: Paint::Gradient(Gradient::gold(0.0, state.viewport_width)),
    });
    if let Some(sample) = visible.last() {
        push_marker(head, sample, &window.bounds, out);
    }

    push_vertical_guide(window.stop_position, &window.bounds, out);
}

fn push_zone_line(row: &Bounds, out: &mut Vec<DrawCommand>) {
    out.push(DrawCommand::Line {
        from: Point {
            x: row.left,
            y: row.top,
        },
        to: Point {
            x: row.right,
            y: row.top,
        },
        width: 1.0,
        color: GOLD_ZONE,
        dash: Some((2.0, 2.0)),
    });
}

fn push_zone_label(row: &Bounds, text: String, out: &mut Vec<DrawCommand>) {
    out.push(DrawCommand::Text {
        pos: Point {
            x: row.right + 5.0,
            y: row.top + 12.0,
        },
        text,
        size: 10.0,
        color: GOLD_LABEL,
        align: Align::Left,
    });
}

fn push_vertical_guide(x: f32, bounds: &Bounds, out: &mut Vec<DrawCommand>) {
    out.push(DrawCommand::Line {
        from: Point { x, y: bounds.top },
        to: Point {
            x,
            y: bounds.bottom,
        },
        width: 1.0,
        color: PROGRESS,
        dash: Some((2.0, 2.0)),
    });
}

/// Two concentric dots at the head plus the price label. The label sits to
/// the right unless it would cross `bounds.right - 5`.
fn push_marker(head: Point, sample: &Sample, bounds: &Bounds, out: &mut Vec<DrawCommand>) {
    let w = bounds.width();
    out.push(DrawCommand::Circle {
        center: head,
        radius: (w * 0.1).max(6.0),
        color: GOLD_GLOW,
    });
    out.push(DrawCommand::Circle {
        center: head,
        radius: (w * 0.05).max(3.0),
        color: GOLD,
    });

    let text = format!("{:.2}", sample.price);
    let size = (w * 0.15).max(10.0);
    let tw = text_width(&text, size);
    let mut x = head.x + 10.0;
    if x + tw > bounds.right - 5.0 {
        x = head.x - tw - 10.0;
    }
    out.push(DrawCommand::Text {
        pos: Point { x, y: head.y },
        text,
        size,
        color: WHITE,
        align: Align::Left,
    });
}

fn draw_round_info(state: &AppState, session: &Session, out: &mut Vec<DrawCommand>) {
    let n = session.round_number();
    let cols = state.grid.cols.max(1) as u64;
    out.push(DrawCommand::Text {
        pos: Point { x: 10.0, y: 20.0 },
        text: format!("Round {}", n / cols + 1),
        size: 14.0,
        color: GOLD,
        align: Align::Left,
    });
    out.push(DrawCommand::Text {
        pos: Point { x: 10.0, y: 38.0 },
        text: format!("Game {}", n + 1),
        size: 12.0,
        color: GOLD_LABEL,
        align: Align::Left,
    });
}

fn draw_placeholder(state: &AppState, out: &mut Vec<DrawCommand>) {
    let Some(grid) = state.layout.grid_bounds() else {
        return;
    };
    out.push(DrawCommand::FillRect {
        bounds: grid,
        color: PLACEHOLDER_PANEL,
    });
    out.push(DrawCommand::Text {
        pos: Point {
            x: grid.center_x(),
            y: (grid.top + grid.bottom) * 0.5,
        },
        text: placeholder_text(state.connection).to_string(),
        size: 16.0,
        color: PLACEHOLDER_TEXT,
        align: Align::Center,
    });
}

pub fn placeholder_text(conn: ConnectionState) -> &'static str {
    match conn {
        ConnectionState::Connecting => "Connecting...",
        ConnectionState::Open => "Loading...",
        ConnectionState::Closed | ConnectionState::Disconnected => "Not connected",
    }
}

fn draw_status(state: &AppState, out: &mut Vec<DrawCommand>) {
    let (text, color) = if state.is_live() {
        ("● LIVE", GOLD)
    } else {
        ("● OFFLINE", OFFLINE_RED)
    };
    out.push(DrawCommand::Text {
        pos: Point {
            x: state.viewport_width - 60.0,
            y: 20.0,
        },
        text: text.to_string(),
        size: 12.0,
        color,
        align: Align::Left,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{reduce, AppEvent, FeedEvent, TimerEvent, ViewportEvent};
    use crate::settings::ChartSettings;

    fn texts(cmds: &[DrawCommand]) -> Vec<String> {
        cmds.iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn state_with(settings: ChartSettings) -> AppState {
        let mut state = AppState::new(settings).unwrap();
        reduce(
            &mut state,
            AppEvent::Viewport(ViewportEvent::Resized {
                width: 1200.0,
                height: 600.0,
            }),
        );
        state
    }

    fn go_live(state: &mut AppState) {
        reduce(
            state,
            AppEvent::Feed(FeedEvent::Connection(ConnectionState::Open)),
        );
    }

    fn feed(state: &mut AppState, now: i64, price: f64) {
        reduce(state, AppEvent::Timer(TimerEvent::Tick { now_ms: now }));
        reduce(
            state,
            AppEvent::Feed(FeedEvent::Sample(Sample {
                timestamp: now,
                price,
            })),
        );
    }

    #[test]
    fn offline_draws_placeholder_only() {
        let state = state_with(ChartSettings::default());
        let cmds = render(&state);
        assert!(matches!(cmds[0], DrawCommand::Clear { .. }));
        let t = texts(&cmds);
        assert!(t.contains(&"Connecting...".to_string()));
        assert!(t.contains(&"● OFFLINE".to_string()));
        assert!(!cmds.iter().any(|c| matches!(c, DrawCommand::Polyline { .. })));
    }

    #[test]
    fn empty_viewport_only_clears() {
        let state = AppState::new(ChartSettings::default()).unwrap();
        assert_eq!(render(&state).len(), 1);
    }

    #[test]
    fn live_round_draws_in_order() {
        let mut state = state_with(ChartSettings::default());
        go_live(&mut state);
        feed(&mut state, 0, 150.0);
        feed(&mut state, 1_000, 150.02);
        let cmds = render(&state);

        let pos = |pred: &dyn Fn(&DrawCommand) -> bool| cmds.iter().position(|c| pred(c));
        let zone = pos(&|c: &DrawCommand| matches!(c, DrawCommand::Line { dash: Some((d, _)), .. } if *d == 2.0)).unwrap();
        let highlight = pos(&|c: &DrawCommand| matches!(c, DrawCommand::FillRect { .. })).unwrap();
        let line = pos(&|c: &DrawCommand| matches!(c, DrawCommand::Polyline { paint: Paint::Gradient(_), .. })).unwrap();
        let marker = pos(&|c: &DrawCommand| matches!(c, DrawCommand::Circle { .. })).unwrap();
        assert!(zone < highlight && highlight < line && line < marker);

        let t = texts(&cmds);
        assert!(t.contains(&"● LIVE".to_string()));
        assert!(t.contains(&"Round 1".to_string()));
        assert!(t.contains(&"Game 1".to_string()));
        assert!(t.contains(&"29s".to_string()));
        assert!(t.contains(&"150.02".to_string()));
    }

    #[test]
    fn connector_bridges_archived_and_active() {
        let mut state = state_with(ChartSettings::default());
        go_live(&mut state);
        feed(&mut state, 0, 150.0);
        feed(&mut state, 29_000, 150.01);
        feed(&mut state, 30_500, 150.03);
        let cmds = render(&state);
        let connectors = cmds
            .iter()
            .filter(|c| matches!(c, DrawCommand::Line { dash: Some((d, _)), .. } if *d == 5.0))
            .count();
        assert_eq!(connectors, 1);
        assert!(texts(&cmds).contains(&"Game 2".to_string()));
    }

    #[test]
    fn price_label_flips_near_right_edge() {
        let bounds = Bounds {
            left: 0.0,
            right: 100.0,
            top: 0.0,
            bottom: 100.0,
        };
        let sample = Sample {
            timestamp: 0,
            price: 150.0,
        };
        let mut out = Vec::new();
        push_marker(Point { x: 95.0, y: 50.0 }, &sample, &bounds, &mut out);
        let DrawCommand::Text { pos, .. } = &out[2] else {
            panic!("expected label");
        };
        assert!(pos.x < 95.0);

        let mut out = Vec::new();
        push_marker(Point { x: 5.0, y: 50.0 }, &sample, &bounds, &mut out);
        let DrawCommand::Text { pos, .. } = &out[2] else {
            panic!("expected label");
        };
        assert_eq!(pos.x, 15.0);
    }

    #[test]
    fn stop_column_mode_stays_left_of_stop() {
        let mut settings = ChartSettings::default();
        settings.mode = ChartMode::StopColumn;
        let mut state = state_with(settings);
        go_live(&mut state);
        for i in 0..40 {
            feed(&mut state, i * 200, 150.0 + (i % 7) as f64 * 0.01);
        }
        let window = StopColumnWindow::from_layout(&state.layout, state.grid.stop_at_column).unwrap();
        let cmds = render(&state);
        let points = cmds
            .iter()
            .find_map(|c| match c {
                DrawCommand::Polyline { points, .. } => Some(points.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(points.len(), window.capacity);
        assert!(points.iter().all(|p| p.x >= 0.0 && p.x <= window.stop_position + 1e-3));
    }

    #[test]
    fn gradient_hits_stops() {
        let g = Gradient::gold(0.0, 100.0);
        assert_eq!(g.color_at(-10.0), Color::rgb(0xFA, 0xE2, 0x79));
        assert_eq!(g.color_at(20.0), Color::rgb(0xE9, 0xBD, 0x49));
        assert_eq!(g.color_at(100.0), Color::rgb(0xE9, 0xBD, 0x49));
    }
}
