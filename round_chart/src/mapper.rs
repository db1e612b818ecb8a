// mapper.rs - samples -> canvas points, time-progress and stop-column policies

use crate::feed::Sample;
use crate::grid::{Bounds, GridLayout};

/// Minimum absolute padding used when a range collapses to a single price.
pub const MIN_PRICE_PADDING: f64 = 1.0;
pub const PRICE_PADDING_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    /// Symmetric padding of 10% of the span, or 1 unit when the span is zero.
    pub fn padded(min: f64, max: f64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = hi - lo;
        let pad = if span > 0.0 {
            span * PRICE_PADDING_RATIO
        } else {
            MIN_PRICE_PADDING
        };
        Self {
            min: lo - pad,
            max: hi + pad,
        }
    }

    /// Padded range over every finite price in `prices`.
    pub fn from_prices<I: IntoIterator<Item = f64>>(prices: I) -> Option<Self> {
        let mut iter = prices.into_iter().filter(|p| p.is_finite());
        let first = iter.next()?;
        let (lo, hi) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self::padded(lo, hi))
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// 0 at `min`, 1 at `max`, clamped.
    pub fn normalize(&self, price: f64) -> f64 {
        let span = self.span();
        if !(span > 0.0) {
            return 0.5;
        }
        ((price - self.min) / span).clamp(0.0, 1.0)
    }
}

/// Canvas y for `price` inside `bounds`, leaving a 5% margin top and bottom.
pub fn price_to_y(price: f64, range: &PriceRange, bounds: &Bounds) -> f32 {
    let n = range.normalize(price) as f32;
    let h = bounds.height();
    bounds.bottom - n * h * 0.9 - h * 0.05
}

/// Inverse of [`price_to_y`] for a y inside `bounds`.
pub fn y_to_price(y: f32, range: &PriceRange, bounds: &Bounds) -> f64 {
    let h = bounds.height();
    if !(h > 0.0) {
        return (range.min + range.max) / 2.0;
    }
    let n = ((bounds.bottom - y - h * 0.05) / (h * 0.9)) as f64;
    range.min + n * range.span()
}

/// Fraction of the round elapsed at `timestamp`, clamped to [0, 1].
pub fn time_progress(timestamp: i64, start_time: i64, duration_ms: i64) -> f64 {
    if duration_ms <= 0 {
        return 1.0;
    }
    ((timestamp - start_time) as f64 / duration_ms as f64).clamp(0.0, 1.0)
}

/// Time-progress policy: x follows the sample's position within its round.
pub fn map_time_progress(
    samples: &[Sample],
    start_time: i64,
    duration_ms: i64,
    column: &Bounds,
    range: &PriceRange,
) -> Vec<Point> {
    samples
        .iter()
        .map(|s| Point {
            x: column.left
                + column.width() * time_progress(s.timestamp, start_time, duration_ms) as f32,
            y: price_to_y(s.price, range, column),
        })
        .collect()
}

/// Geometry of the stop-column window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopColumnWindow {
    pub origin: f32,
    pub pitch: f32,
    pub stop_position: f32,
    pub capacity: usize,
    pub bounds: Bounds,
}

impl StopColumnWindow {
    /// First point at the first column's centre, one column pitch per sample,
    /// head frozen at the centre of the stop cell.
    pub fn from_layout(layout: &GridLayout, stop_at_column: u32) -> Option<Self> {
        let bounds = layout.grid_bounds()?;
        let origin = layout.cell(0, 0)?.center_x;
        let stop_position = layout.stop_position(stop_at_column)?;
        let pitch = layout.pitch();
        if !(pitch > 0.0) {
            return None;
        }
        let capacity = ((stop_position - origin) / pitch + 1e-3).floor().max(0.0) as usize + 1;
        Some(Self {
            origin,
            pitch,
            stop_position,
            capacity,
            bounds,
        })
    }

    /// The trailing samples that fit in the window.
    pub fn visible<'a>(&self, history: &'a [Sample]) -> &'a [Sample] {
        let skip = history.len().saturating_sub(self.capacity);
        &history[skip..]
    }
}

/// Stop-column policy: the head advances one pitch per sample until it
/// reaches the stop position, after which older samples shift left.
pub fn map_stop_column(
    history: &[Sample],
    window: &StopColumnWindow,
    range: &PriceRange,
) -> Vec<Point> {
    window
        .visible(history)
        .iter()
        .enumerate()
        .map(|(i, s)| Point {
            x: (window.origin + window.pitch * i as f32).min(window.stop_position),
            y: price_to_y(s.price, range, &window.bounds),
        })
        .collect()
}
