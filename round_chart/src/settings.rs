// round_chart/src/settings.rs

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use crate::error::ConfigError;
use crate::feed::FeedKind;
use crate::grid::{DeviceClass, DevicePresets, GridConfig};
use crate::session::{OverflowPolicy, DEFAULT_ROUND_DURATION_MS};

/// Bump when you change config schema.
const CONFIG_VERSION: u32 = 1;

pub const ENV_FEED_URL: &str = "ROUND_CHART_FEED_URL";
pub const ENV_FEED_KIND: &str = "ROUND_CHART_FEED_KIND";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "ROUND_CHART_MAX_RECONNECT_ATTEMPTS";
pub const ENV_MAX_DATA_POINTS: &str = "ROUND_CHART_MAX_DATA_POINTS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub kind: FeedKind,
    pub url: String,
    pub feed_id: String,
    pub price_scale: f64,
    /// `None` keeps full precision.
    pub price_decimals: Option<u32>,
    pub settle_ms: i64,
    /// Frames dated further ahead of the local clock are dropped as malformed.
    pub max_future_skew_ms: i64,
    pub reconnect_min_ms: u64,
    pub reconnect_max_ms: u64,
    pub max_reconnect_attempts: usize,
    pub append_from_param: bool,
    pub dummy_interval_ms: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            kind: FeedKind::Ws,
            url: "wss://bananazone.app".to_string(),
            feed_id: "SOL_USD".to_string(),
            price_scale: 1e8,
            price_decimals: Some(2),
            settle_ms: 2000,
            max_future_skew_ms: 60_000,
            reconnect_min_ms: 1000,
            reconnect_max_ms: 30_000,
            max_reconnect_attempts: 10,
            append_from_param: true,
            dummy_interval_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundSettings {
    pub duration_ms: i64,
    pub tick_ms: u64,
    pub overflow: OverflowPolicy,
}

impl Default for RoundSettings {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_ROUND_DURATION_MS,
            tick_ms: 100,
            overflow: OverflowPolicy::Wrap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    /// Price units per row.
    pub band_width: f64,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self { band_width: 0.05 }
    }
}

/// Which mapping policy the chart draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartMode {
    /// One column per round, x from elapsed round time.
    #[default]
    Rounds,
    /// Continuous line frozen at the stop column.
    StopColumn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub version: u32,
    pub mode: ChartMode,
    pub feed: FeedSettings,
    pub round: RoundSettings,
    pub zones: ZoneSettings,
    pub max_data_points: usize,
    pub devices: DevicePresets,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            mode: ChartMode::Rounds,
            feed: FeedSettings::default(),
            round: RoundSettings::default(),
            zones: ZoneSettings::default(),
            max_data_points: 1000,
            devices: DevicePresets::default(),
        }
    }
}

impl ChartSettings {
    /// Reject anything that would make the first draw meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.devices.validate()?;
        let scale = self.feed.price_scale;
        if !(scale > 0.0) || !scale.is_finite() {
            return Err(ConfigError::NonPositiveScale(scale));
        }
        if self.round.duration_ms <= 0 {
            return Err(ConfigError::InvalidRoundDuration(self.round.duration_ms));
        }
        Ok(())
    }

    pub fn grid_for_width(&self, width: f32) -> (DeviceClass, GridConfig) {
        let class = DeviceClass::from_width(width);
        (class, self.devices.for_class(class))
    }

    /// Apply `ROUND_CHART_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Unparsable values are ignored.
    pub fn apply_overrides<F: Fn(&str) -> Option<String>>(&mut self, get: F) {
        if let Some(url) = get(ENV_FEED_URL).filter(|s| !s.trim().is_empty()) {
            self.feed.url = url.trim().to_string();
        }
        if let Some(kind) = get(ENV_FEED_KIND).and_then(|s| FeedKind::parse(&s)) {
            self.feed.kind = kind;
        }
        if let Some(n) = get(ENV_MAX_RECONNECT_ATTEMPTS).and_then(|s| s.trim().parse().ok()) {
            self.feed.max_reconnect_attempts = n;
        }
        if let Some(n) = get(ENV_MAX_DATA_POINTS).and_then(|s| s.trim().parse::<usize>().ok()) {
            self.max_data_points = n.max(1);
        }
    }
}

struct Inner {
    path: PathBuf,
    last_saved_json: Mutex<String>,
}

/// JSON settings file with atomic saves.
#[derive(Clone)]
pub struct Persistence {
    inner: Arc<Inner>,
}

impl Persistence {
    pub fn new() -> Result<Self> {
        Ok(Self::at(default_config_path()?))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                last_saved_json: Mutex::new(String::new()),
            }),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.inner.path
    }

    /// Missing file: defaults, written back. Unreadable file: archived, defaults.
    pub fn load(&self) -> ChartSettings {
        let path = &self.inner.path;
        if !path.exists() {
            let cfg = ChartSettings::default();
            if let Err(err) = self.save_now(&cfg) {
                tracing::warn!(target: "settings", ?err, "could not write default settings");
            }
            return cfg;
        }
        match read_settings(path) {
            Ok(mut cfg) => {
                if cfg.version < CONFIG_VERSION {
                    tracing::info!(target: "settings", from = cfg.version, to = CONFIG_VERSION, "settings schema upgraded");
                    cfg.version = CONFIG_VERSION;
                }
                cfg
            }
            Err(err) => {
                set_aside_corrupt(path, &err);
                ChartSettings::default()
            }
        }
    }

    /// Write `cfg` unless it matches what this store last wrote. The file it
    /// replaces is kept next to it as `settings.json.bak`.
    pub fn save_now(&self, cfg: &ChartSettings) -> Result<()> {
        let path = &self.inner.path;
        let json = serde_json::to_string_pretty(cfg).context("serialize settings")?;
        {
            let mut last = self
                .inner
                .last_saved_json
                .lock()
                .map_err(|_| anyhow::anyhow!("settings store lock poisoned"))?;
            if *last == json {
                return Ok(());
            }
            *last = json.clone();
        }

        let dir = path.parent().context("settings path has no parent dir")?;
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        keep_backup(path);
        replace_file(path, json.as_bytes())?;
        tracing::debug!(target: "settings", path = %path.display(), "settings saved");
        Ok(())
    }
}

fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("app", "roundchart", "round_chart")
        .context("no home directory to place settings in")?;
    Ok(dirs.config_dir().join("settings.json"))
}

fn read_settings(path: &Path) -> Result<ChartSettings> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

fn keep_backup(path: &Path) {
    if !path.exists() {
        return;
    }
    let backup = path.with_extension("json.bak");
    if let Err(err) = fs::copy(path, &backup) {
        tracing::warn!(target: "settings", %err, backup = %backup.display(), "could not back up settings");
    }
}

/// Move an unreadable settings file out of the way so defaults can be saved.
fn set_aside_corrupt(path: &Path, err: &anyhow::Error) {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let target = path.with_extension(format!("corrupt.{stamp}.json"));
    match fs::rename(path, &target) {
        Ok(()) => tracing::warn!(target: "settings", err = %format!("{err:#}"), moved_to = %target.display(), "settings unreadable; using defaults"),
        Err(io) => tracing::warn!(target: "settings", err = %format!("{err:#}"), %io, "settings unreadable and could not be moved; using defaults"),
    }
}

/// Write to a sibling temp file, fsync, then rename over `path`.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .context("settings path has no file name")?
        .to_string_lossy();
    let tmp = path.with_file_name(format!(".{name}.{}.tmp", std::process::id()));

    let written = fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        })
        .with_context(|| format!("write {}", tmp.display()));
    if let Err(err) = written.and_then(|()| {
        fs::rename(&tmp, path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))
    }) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}
