use std::collections::VecDeque;

use crate::error::ConfigError;
use crate::feed::{ConnectionState, Sample};
use crate::grid::{compute_grid, DeviceClass, GridConfig, GridLayout};
use crate::session::Session;
use crate::settings::{ChartMode, ChartSettings};
use crate::zones::PriceZone;

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: ChartSettings,
    pub mode: ChartMode,

    // layout
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub device: DeviceClass,
    pub grid: GridConfig,
    pub layout: GridLayout,

    // feed
    pub connection: ConnectionState,
    pub last_price: Option<f64>,
    /// Bounded, oldest first. Feeds the stop-column view.
    pub history: VecDeque<Sample>,
    pub samples_accepted: u64,
    pub samples_rejected: u64,

    // rounds
    pub session: Option<Session>,
    pub zones: Vec<PriceZone>,
    pub now_ms: i64,
}

impl AppState {
    /// Fails before any drawing if the settings cannot produce a chart.
    pub fn new(settings: ChartSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let (device, grid) = settings.grid_for_width(0.0);
        Ok(Self {
            mode: settings.mode,
            viewport_width: 0.0,
            viewport_height: 0.0,
            device,
            grid,
            layout: compute_grid(0.0, 0.0, grid.cols, grid.rows),
            connection: ConnectionState::Connecting,
            last_price: None,
            history: VecDeque::new(),
            samples_accepted: 0,
            samples_rejected: 0,
            session: None,
            zones: Vec::new(),
            now_ms: 0,
            settings,
        })
    }

    pub fn is_live(&self) -> bool {
        self.connection == ConnectionState::Open
    }

    /// Drop the round state. The next accepted sample opens a fresh session.
    pub fn reset_session(&mut self) {
        self.session = None;
        self.zones.clear();
        self.history.clear();
        self.last_price = None;
    }

    pub fn push_history(&mut self, sample: Sample) {
        self.history.push_back(sample);
        let cap = self.settings.max_data_points.max(1);
        while self.history.len() > cap {
            self.history.pop_front();
        }
    }
}
