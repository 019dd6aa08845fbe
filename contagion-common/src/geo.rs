use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng.
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    /// Linearly interpolates towards `other`. `fraction` is clamped to [0, 1].
    pub fn lerp(&self, other: LatLng, fraction: f64) -> Self {
        let t = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        *self + (other - *self) * t
    }
}

impl Add for LatLng {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { lat: self.lat + other.lat, lng: self.lng + other.lng }
    }
}

impl Sub for LatLng {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { lat: self.lat - other.lat, lng: self.lng - other.lng }
    }
}

impl Mul<f64> for LatLng {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self { lat: self.lat * scalar, lng: self.lng * scalar }
    }
}

/// Integer index of a contamination cell. Two locations share a key iff they
/// fall into the same quantized cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub lat_idx: i64,
    pub lng_idx: i64,
}

/// Spatial quantization shipped with a trajectory dataset (`gridparams`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GridParams {
    /// Number of decimal digits encoded in fixed-point coordinates.
    #[serde(default = "default_fixed_point_precision")]
    pub fixed_point_precision: u32,
    /// Cell height in degrees of latitude.
    #[serde(default = "default_cell_size")]
    pub cell_size_lat: f64,
    /// Cell width in degrees of longitude.
    #[serde(default = "default_cell_size")]
    pub cell_size_lng: f64,
}

fn default_fixed_point_precision() -> u32 {
    4
}

fn default_cell_size() -> f64 {
    0.001 // roughly 100m of latitude
}

impl Default for GridParams {
    fn default() -> Self {
        GridParams {
            fixed_point_precision: default_fixed_point_precision(),
            cell_size_lat: default_cell_size(),
            cell_size_lng: default_cell_size(),
        }
    }
}

impl GridParams {
    /// Multiplier between fixed-point integers and decimal degrees.
    pub fn fixed_point_scale(&self) -> f64 {
        10f64.powi(self.fixed_point_precision as i32)
    }

    /// Converts a fixed-point encoded coordinate pair to degrees.
    pub fn decode_location(&self, lat_raw: f64, lng_raw: f64) -> LatLng {
        let scale = self.fixed_point_scale();
        LatLng::new(lat_raw / scale, lng_raw / scale)
    }

    fn has_cell_size(&self) -> bool {
        self.cell_size_lat.is_finite()
            && self.cell_size_lng.is_finite()
            && self.cell_size_lat > 0.0
            && self.cell_size_lng > 0.0
    }

    /// Calculates the cell a location falls into.
    /// Falls back to fixed-point rounding if the cell size is unusable.
    pub fn cell_key(&self, location: LatLng) -> CellKey {
        if self.has_cell_size() {
            CellKey {
                lat_idx: (location.lat / self.cell_size_lat).floor() as i64,
                lng_idx: (location.lng / self.cell_size_lng).floor() as i64,
            }
        } else {
            let scale = self.fixed_point_scale();
            CellKey {
                lat_idx: (location.lat * scale).round() as i64,
                lng_idx: (location.lng * scale).round() as i64,
            }
        }
    }

    /// Center point of a cell.
    pub fn cell_center(&self, key: CellKey) -> LatLng {
        if self.has_cell_size() {
            LatLng::new(
                (key.lat_idx as f64 + 0.5) * self.cell_size_lat,
                (key.lng_idx as f64 + 0.5) * self.cell_size_lng,
            )
        } else {
            let scale = self.fixed_point_scale();
            LatLng::new(key.lat_idx as f64 / scale, key.lng_idx as f64 / scale)
        }
    }

    /// Distance between two locations, measured in cells.
    pub fn cell_distance(&self, a: LatLng, b: LatLng) -> f64 {
        let d = b - a;
        if self.has_cell_size() {
            (d.lat / self.cell_size_lat).hypot(d.lng / self.cell_size_lng)
        } else {
            let scale = self.fixed_point_scale();
            (d.lat * scale).hypot(d.lng * scale)
        }
    }
}
