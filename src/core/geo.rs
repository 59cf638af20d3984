use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latitude limit of the Web Mercator projection
pub const MAX_LATITUDE: f64 = 85.0511;

/// Side length of a raster tile in pixels
pub const TILE_SIZE: u32 = 256;

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Clamps latitude to the Mercator-valid range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Normalizes longitude into `(-180, 180]`
    pub fn normalize_lng(lng: f64) -> f64 {
        let wrapped = (lng + 180.0).rem_euclid(360.0) - 180.0;
        if wrapped == -180.0 {
            180.0
        } else {
            wrapped
        }
    }

    /// Returns the same position with both invariants applied
    pub fn normalized(&self) -> LatLng {
        LatLng::new(Self::clamp_lat(self.lat), Self::normalize_lng(self.lng))
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a point in screen or tile-space coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Represents a bounding box of geographical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self::new(LatLng::new(south, west), LatLng::new(north, east))
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }
}

/// Identifies one raster tile in the slippy map tile pyramid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Builds a tile coordinate from a signed grid cell, wrapping the
    /// column across the antimeridian. Rows outside `[0, 2^z)` have no
    /// data (the poles are hard bounds) and yield `None`.
    pub fn wrapped(z: u8, grid_x: i64, grid_y: i64) -> Option<TileCoord> {
        let n = 1_i64 << z;
        if grid_y < 0 || grid_y >= n {
            return None;
        }
        let x = grid_x.rem_euclid(n);
        Some(TileCoord::new(x as u32, grid_y as u32, z))
    }

    /// Checks that both indices fit the tile pyramid at this zoom level
    pub fn is_valid(&self) -> bool {
        let n = 1_u64 << self.z;
        (self.x as u64) < n && (self.y as u64) < n
    }
}

/// Fractional tile coordinates of a geographic position at `zoom`,
/// using the standard Web Mercator tile formula.
pub fn lat_lng_to_tile(pos: &LatLng, zoom: u8) -> Point {
    let lat_rad = LatLng::clamp_lat(pos.lat).to_radians();
    let n = 2_f64.powi(zoom as i32);
    let x = (pos.lng + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    Point::new(x, y)
}

/// Exact inverse of [`lat_lng_to_tile`]
pub fn tile_to_lat_lng(x: f64, y: f64, zoom: u8) -> LatLng {
    let n = 2_f64.powi(zoom as i32);
    let lng = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_round_trip() {
        let positions = [
            LatLng::new(10.7769, 106.7009),
            LatLng::new(50.1109, 8.6821),
            LatLng::new(-33.8688, 151.2093),
            LatLng::new(0.0, 0.0),
            LatLng::new(84.9, -179.5),
        ];
        for zoom in [0_u8, 7, 12, 18] {
            for pos in &positions {
                let tile = lat_lng_to_tile(pos, zoom);
                let back = tile_to_lat_lng(tile.x, tile.y, zoom);
                assert!((back.lat - pos.lat).abs() < 1e-6, "lat at z{}", zoom);
                assert!((back.lng - pos.lng).abs() < 1e-6, "lng at z{}", zoom);
            }
        }
    }

    #[test]
    fn test_normalize_lng() {
        assert_eq!(LatLng::normalize_lng(181.0), -179.0);
        assert_eq!(LatLng::normalize_lng(-181.0), 179.0);
        assert_eq!(LatLng::normalize_lng(540.0), 180.0);
        assert_eq!(LatLng::normalize_lng(-180.0), 180.0);
        assert_eq!(LatLng::normalize_lng(106.7), 106.7);
    }

    #[test]
    fn test_clamp_lat() {
        assert_eq!(LatLng::clamp_lat(89.0), MAX_LATITUDE);
        assert_eq!(LatLng::clamp_lat(-89.0), -MAX_LATITUDE);
        assert_eq!(LatLng::clamp_lat(10.5), 10.5);
    }

    #[test]
    fn test_tile_wrapping() {
        // x = 2^z resolves to tile 0; negative columns wrap from the east
        let z = 7_u8;
        let n = 1_i64 << z;
        assert_eq!(TileCoord::wrapped(z, n, 5), Some(TileCoord::new(0, 5, z)));
        assert_eq!(
            TileCoord::wrapped(z, -1, 5),
            Some(TileCoord::new((n - 1) as u32, 5, z))
        );
        // rows never wrap
        assert_eq!(TileCoord::wrapped(z, 3, -1), None);
        assert_eq!(TileCoord::wrapped(z, 3, n), None);
    }

    #[test]
    fn test_tile_coord_validity() {
        assert!(TileCoord::new(127, 127, 7).is_valid());
        assert!(!TileCoord::new(128, 0, 7).is_valid());
        assert!(!TileCoord::new(0, 128, 7).is_valid());
    }
}
