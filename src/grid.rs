//! Spatial binning of raw coordinates into a fixed decimal-degree grid.
//!
//! Three decimal places is roughly 111 m per cell at the equator. Cells are
//! not widened with latitude, so they narrow in longitude towards the poles.
//!
//! Rounding is half away from zero, applied to `value * 10^precision`. The
//! cell is kept as an integer so that grouping compares exactly, and only
//! converted back to degrees when a hotspot row is emitted.

/// Decimal places kept when snapping a coordinate.
pub const GRID_PRECISION: i32 = 3;

/// A snapped (latitude, longitude) pair in units of `10^-GRID_PRECISION` degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridCell {
    pub lat: i64,
    pub lon: i64,
}

impl GridCell {
    pub fn lat_degrees(&self) -> f64 {
        to_degrees(self.lat)
    }

    pub fn lon_degrees(&self) -> f64 {
        to_degrees(self.lon)
    }
}

fn scale() -> f64 {
    10f64.powi(GRID_PRECISION)
}

/// Snap a single coordinate to its cell index.
pub fn snap_coordinate(value: f64) -> i64 {
    // f64::round is half away from zero
    (value * scale()).round() as i64
}

fn to_degrees(cell: i64) -> f64 {
    cell as f64 / scale()
}

/// Snap a position to its cell. NaN or infinite coordinates have no cell.
pub fn snap(latitude: f64, longitude: f64) -> Option<GridCell> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    Some(GridCell {
        lat: snap_coordinate(latitude),
        lon: snap_coordinate(longitude),
    })
}
