// session.rs - round clock: one active round, archived rounds keyed by column

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::feed::Sample;

pub const DEFAULT_ROUND_DURATION_MS: i64 = 30_000;

/// What happens when the column cursor runs past the last column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Back to column 0, evicting whatever was archived there.
    #[default]
    Wrap,
    /// Keep counting; the view follows the last `cols` columns.
    Scroll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub column_index: u64,
    pub round_number: u64,
    pub start_time: i64,
    pub samples: Vec<Sample>,
}

impl Round {
    fn new(column_index: u64, round_number: u64, start_time: i64) -> Self {
        Self {
            column_index,
            round_number,
            start_time,
            samples: Vec::new(),
        }
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Summary of one archive-and-advance transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundAdvance {
    pub archived_round: u64,
    pub archived_column: u64,
    pub archived_samples: usize,
    pub next_round: u64,
    pub next_column: u64,
    pub next_start: i64,
    pub evicted: usize,
}

#[derive(Debug, Clone)]
pub struct Session {
    cols: u32,
    duration_ms: i64,
    overflow: OverflowPolicy,
    active: Round,
    archived: VecDeque<Round>,
    last_timestamp: Option<i64>,
}

impl Session {
    pub fn new(
        start_time: i64,
        cols: u32,
        duration_ms: i64,
        overflow: OverflowPolicy,
    ) -> Result<Self, ConfigError> {
        if cols == 0 {
            return Err(ConfigError::ZeroColumns);
        }
        if duration_ms <= 0 {
            return Err(ConfigError::InvalidRoundDuration(duration_ms));
        }
        Ok(Self {
            cols,
            duration_ms,
            overflow,
            active: Round::new(0, 0, start_time),
            archived: VecDeque::new(),
            last_timestamp: None,
        })
    }

    pub fn active(&self) -> &Round {
        &self.active
    }

    /// Archived rounds, oldest first.
    pub fn archived(&self) -> impl DoubleEndedIterator<Item = &Round> + ExactSizeIterator {
        self.archived.iter()
    }

    pub fn round_number(&self) -> u64 {
        self.active.round_number
    }

    pub fn column_index(&self) -> u64 {
        self.active.column_index
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn elapsed_ms(&self, now: i64) -> i64 {
        (now - self.active.start_time).max(0)
    }

    /// Fraction of the active round elapsed on the wall clock, in [0, 1].
    pub fn progress(&self, now: i64) -> f64 {
        (self.elapsed_ms(now) as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
    }

    /// Whole seconds left in the active round, rounded up.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        let left = (self.duration_ms - self.elapsed_ms(now)).max(0);
        (left + 999) / 1000
    }

    /// Evaluate the round clock. Archives the active round at most once per
    /// call, even if several durations elapsed; the next round starts on the
    /// duration grid so a stall does not produce empty rounds.
    pub fn tick(&mut self, now: i64) -> Option<RoundAdvance> {
        let elapsed = now - self.active.start_time;
        if elapsed < self.duration_ms {
            return None;
        }
        let periods = elapsed / self.duration_ms;
        let next_start = self.active.start_time + periods * self.duration_ms;
        Some(self.advance_round(next_start))
    }

    /// Append a sample to the active round. The clock is evaluated first so a
    /// sample arriving after expiry lands in the new round. Samples older than
    /// the last accepted one are dropped. So are samples dated more than one
    /// round past `now`; they never move the ordering guard.
    pub fn apply_sample(&mut self, sample: Sample, now: i64) -> (Option<RoundAdvance>, bool) {
        let advance = self.tick(now);
        if !sample.price.is_finite() {
            return (advance, false);
        }
        if sample.timestamp > now.saturating_add(self.duration_ms) {
            return (advance, false);
        }
        if matches!(self.last_timestamp, Some(last) if sample.timestamp < last) {
            return (advance, false);
        }
        self.last_timestamp = Some(sample.timestamp);
        self.active.samples.push(sample);
        (advance, true)
    }

    /// Archive the active round and open the next one at `next_start`.
    pub fn advance_round(&mut self, next_start: i64) -> RoundAdvance {
        let next_column = match self.overflow {
            OverflowPolicy::Wrap => (self.active.column_index + 1) % self.cols as u64,
            OverflowPolicy::Scroll => self.active.column_index + 1,
        };
        let next_round = self.active.round_number + 1;
        let finished = std::mem::replace(
            &mut self.active,
            Round::new(next_column, next_round, next_start),
        );

        let advance = RoundAdvance {
            archived_round: finished.round_number,
            archived_column: finished.column_index,
            archived_samples: finished.samples.len(),
            next_round,
            next_column,
            next_start,
            evicted: 0,
        };
        self.archived.push_back(finished);

        let before = self.archived.len();
        let cols = self.cols as u64;
        match self.overflow {
            OverflowPolicy::Wrap => self.archived.retain(|r| r.column_index != next_column),
            OverflowPolicy::Scroll => self.archived.retain(|r| r.column_index + cols > next_column),
        }

        RoundAdvance {
            evicted: before - self.archived.len(),
            ..advance
        }
    }

    /// Leftmost logical column currently on screen.
    pub fn first_visible_column(&self) -> u64 {
        match self.overflow {
            OverflowPolicy::Wrap => 0,
            OverflowPolicy::Scroll => self
                .active
                .column_index
                .saturating_sub(self.cols as u64 - 1),
        }
    }

    /// Grid column (0-based) where the round with `column_index` is drawn.
    pub fn visual_column(&self, column_index: u64) -> Option<u32> {
        let first = self.first_visible_column();
        let col = column_index.checked_sub(first)?;
        (col < self.cols as u64).then_some(col as u32)
    }

    /// Every retained sample, oldest first.
    pub fn all_samples(&self) -> impl Iterator<Item = &Sample> {
        self.archived
            .iter()
            .flat_map(|r| r.samples.iter())
            .chain(self.active.samples.iter())
    }
}
