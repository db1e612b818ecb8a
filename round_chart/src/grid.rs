use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MOBILE_MAX_WIDTH: f32 = 768.0;
pub const TABLET_MAX_WIDTH: f32 = 1024.0;

/// Columns, rows and the 1-based stop column of one device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub cols: u32,
    pub rows: u32,
    pub stop_at_column: u32,
}

impl GridConfig {
    pub fn new(cols: u32, rows: u32, stop_at_column: u32) -> Result<Self, ConfigError> {
        let cfg = Self {
            cols,
            rows,
            stop_at_column,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cols == 0 {
            return Err(ConfigError::ZeroColumns);
        }
        if self.rows == 0 {
            return Err(ConfigError::ZeroRows);
        }
        if self.stop_at_column == 0 || self.stop_at_column > self.cols {
            return Err(ConfigError::StopColumnOutOfRange {
                stop: self.stop_at_column,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn from_width(width: f32) -> Self {
        if width < MOBILE_MAX_WIDTH {
            DeviceClass::Mobile
        } else if width < TABLET_MAX_WIDTH {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

/// Per-device grid presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicePresets {
    pub mobile: GridConfig,
    pub tablet: GridConfig,
    pub desktop: GridConfig,
}

impl Default for DevicePresets {
    fn default() -> Self {
        Self {
            mobile: GridConfig {
                cols: 4,
                rows: 4,
                stop_at_column: 4,
            },
            tablet: GridConfig {
                cols: 6,
                rows: 4,
                stop_at_column: 4,
            },
            desktop: GridConfig {
                cols: 8,
                rows: 4,
                stop_at_column: 7,
            },
        }
    }
}

impl DevicePresets {
    pub fn for_class(&self, class: DeviceClass) -> GridConfig {
        match class {
            DeviceClass::Mobile => self.mobile,
            DeviceClass::Tablet => self.tablet,
            DeviceClass::Desktop => self.desktop,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mobile.validate()?;
        self.tablet.validate()?;
        self.desktop.validate()
    }
}

/// One square grid cell in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub center_x: f32,
    pub center_y: f32,
}

/// Axis-aligned rectangle spanning one or more cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridLayout {
    pub cells: Vec<Cell>,
    pub cols: u32,
    pub rows: u32,
    pub cell_size: f32,
    pub gap: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
}

/// Lay out `cols * rows` square cells centred in the viewport.
///
/// The gap scales with the viewport width (`width / 200`, clamped to 1..=4).
/// Cells are sized to fit the tighter dimension and enumerated row-major.
/// A non-positive viewport or empty grid yields no cells.
pub fn compute_grid(viewport_width: f32, viewport_height: f32, cols: u32, rows: u32) -> GridLayout {
    if cols == 0 || rows == 0 || !(viewport_width > 0.0) || !(viewport_height > 0.0) {
        return GridLayout {
            cols,
            rows,
            viewport_width: viewport_width.max(0.0),
            viewport_height: viewport_height.max(0.0),
            ..GridLayout::default()
        };
    }

    let gap = (viewport_width / 200.0).clamp(1.0, 4.0);
    let colsf = cols as f32;
    let rowsf = rows as f32;

    let max_cell_w = (viewport_width - gap * (colsf - 1.0)) / colsf;
    let max_cell_h = (viewport_height - gap * (rowsf - 1.0)) / rowsf;
    let cell_size = max_cell_w.min(max_cell_h).max(0.0);

    let footprint_w = colsf * cell_size + (colsf - 1.0) * gap;
    let footprint_h = rowsf * cell_size + (rowsf - 1.0) * gap;
    let offset_x = (viewport_width - footprint_w) / 2.0;
    let offset_y = (viewport_height - footprint_h) / 2.0;

    let total = (cols * rows) as usize;
    let mut cells = Vec::with_capacity(total);
    for i in 0..total {
        let row = (i as u32 / cols) as f32;
        let col = (i as u32 % cols) as f32;
        let x = offset_x + col * (cell_size + gap);
        let y = offset_y + row * (cell_size + gap);
        cells.push(Cell {
            x,
            y,
            width: cell_size,
            height: cell_size,
            center_x: x + cell_size / 2.0,
            center_y: y + cell_size / 2.0,
        });
    }

    GridLayout {
        cells,
        cols,
        rows,
        cell_size,
        gap,
        offset_x,
        offset_y,
        viewport_width,
        viewport_height,
    }
}

impl GridLayout {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize)
    }

    /// Distance between the left edges (or centres) of adjacent columns.
    pub fn pitch(&self) -> f32 {
        self.cell_size + self.gap
    }

    /// Rectangle covering every row of visual column `col`.
    pub fn column_bounds(&self, col: u32) -> Option<Bounds> {
        let top = self.cell(0, col)?;
        let bottom = self.cell(self.rows - 1, col)?;
        Some(Bounds {
            left: top.x,
            right: top.x + top.width,
            top: top.y,
            bottom: bottom.y + bottom.height,
        })
    }

    /// Rectangle covering every column of row `row`.
    pub fn row_bounds(&self, row: u32) -> Option<Bounds> {
        let first = self.cell(row, 0)?;
        let last = self.cell(row, self.cols - 1)?;
        Some(Bounds {
            left: first.x,
            right: last.x + last.width,
            top: first.y,
            bottom: first.y + first.height,
        })
    }

    /// Whole occupied footprint.
    pub fn grid_bounds(&self) -> Option<Bounds> {
        let first = self.cells.first()?;
        let last = self.cells.last()?;
        Some(Bounds {
            left: first.x,
            right: last.x + last.width,
            top: first.y,
            bottom: last.y + last.height,
        })
    }

    /// Centre x of the 1-based stop column in the first row.
    pub fn stop_position(&self, stop_at_column: u32) -> Option<f32> {
        let col = stop_at_column.checked_sub(1)?;
        self.cell(0, col).map(|c| c.center_x)
    }
}
