use crate::types::GeoPoint;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Highest zoom level served by the public OSM tile layer
pub const MAX_ZOOM: u8 = 19;

/// Web Mercator latitude limit; beyond it the projection diverges
const MERCATOR_MAX_LAT: f64 = 85.05112878;

/// Slippy-map tile address `(zoom, x, y)`
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct TileKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        TileKey { zoom, x, y }
    }

    /// Number of tiles along one axis at `zoom` (2^zoom)
    ///
    /// # Panics
    /// If `zoom` is above `MAX_ZOOM`.
    pub fn grid_size(zoom: u8) -> u32 {
        assert!(zoom <= MAX_ZOOM, "zoom {} above maximum {}", zoom, MAX_ZOOM);
        1u32 << zoom
    }

    /// Converts WGS84 lat/lon (degrees) to the tile containing it at `zoom`
    ///
    /// Uses Web Mercator projection (EPSG:3857)
    /// Formula:
    ///   n = 2^zoom
    ///   x = floor((lon + 180) / 360 * n)
    ///   y = floor((1 - ln(tan(lat_rad) + sec(lat_rad)) / π) / 2 * n)
    ///
    /// Latitude is clamped to the Mercator range first, so the poles map to the
    /// first/last row instead of NaN. Indices are clamped to `[0, 2^zoom - 1]`.
    ///
    /// # Panics
    /// If `zoom` is above `MAX_ZOOM`; validate with `ZoomRange` first.
    pub fn from_point(point: GeoPoint, zoom: u8) -> Self {
        let lat = point.latitude.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
        let lon = point.longitude;
        let n = Self::grid_size(zoom) as f64;

        let x_raw = (lon + 180.0) / 360.0 * n;

        let lat_rad = lat.to_radians();
        let y_raw =
            (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n;

        TileKey {
            zoom,
            x: clamp_index(x_raw.floor(), zoom),
            y: clamp_index(y_raw.floor(), zoom),
        }
    }

    /// Square block of tiles around the tile containing `center`
    ///
    /// Side is `min(2 * radius + 1, 2^zoom)`. Near the grid edges the block is
    /// slid inward rather than truncated, so it always holds `side * side`
    /// keys and every index stays within `[0, 2^zoom - 1]`.
    ///
    /// Panics like `from_point` for a zoom above `MAX_ZOOM`.
    pub fn bounding_set(center: GeoPoint, zoom: u8, radius: u32) -> Vec<TileKey> {
        let center_tile = TileKey::from_point(center, zoom);
        let n = Self::grid_size(zoom) as u64;
        let side = (2 * radius as u64 + 1).min(n);

        let window_start = |c: u32| -> u32 {
            let start = (c as i64 - radius as i64).max(0) as u64;
            start.min(n - side) as u32
        };
        let x0 = window_start(center_tile.x);
        let y0 = window_start(center_tile.y);

        let mut keys = Vec::with_capacity((side * side) as usize);
        for x in x0..x0 + side as u32 {
            for y in y0..y0 + side as u32 {
                keys.push(TileKey { zoom, x, y });
            }
        }
        keys
    }

    /// True when both indices lie inside the grid for this zoom
    pub fn is_valid(&self) -> bool {
        self.zoom <= MAX_ZOOM
            && self.x < Self::grid_size(self.zoom)
            && self.y < Self::grid_size(self.zoom)
    }

    /// Persisted record key, `zoom-x-y`
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl Display for TileKey {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.zoom, self.x, self.y)
    }
}

impl FromStr for TileKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let mut next = |name: &str| {
            parts
                .next()
                .ok_or_else(|| format!("missing {} in tile key '{}'", name, s))
        };
        let zoom = next("zoom")?;
        let x = next("x")?;
        let y = next("y")?;

        let key = TileKey {
            zoom: zoom.parse().map_err(|_| format!("invalid zoom '{}'", zoom))?,
            x: x.parse().map_err(|_| format!("invalid x '{}'", x))?,
            y: y.parse().map_err(|_| format!("invalid y '{}'", y))?,
        };

        if !key.is_valid() {
            return Err(format!("tile key out of range: {}", key));
        }
        Ok(key)
    }
}

fn clamp_index(raw: f64, zoom: u8) -> u32 {
    let max_tile = (TileKey::grid_size(zoom) - 1) as f64;
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, max_tile) as u32
}
