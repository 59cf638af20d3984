use crate::core::geo::{self, LatLng, Point, TileCoord, TILE_SIZE};
use serde::{Deserialize, Serialize};

/// Direction of one zoom step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

/// One tile slot required by the current view: the wrapped coordinate is
/// the data key, while the unwrapped grid cell drives screen placement so
/// panning across the antimeridian stays seamless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSlot {
    pub coord: TileCoord,
    pub grid_x: i64,
    pub grid_y: i64,
}

/// Manages the current view of the map: center, zoom, and screen size.
///
/// Invariants re-established after every mutation: the center latitude is
/// clamped to the Mercator-valid range and the center longitude is
/// normalized into `(-180, 180]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The center of the map view in geographical coordinates
    pub center: LatLng,
    /// The current zoom level
    pub zoom: u8,
    /// The minimum allowed zoom level
    pub min_zoom: u8,
    /// The maximum allowed zoom level
    pub max_zoom: u8,
    /// The size of the viewport in pixels
    pub size: Point,
}

impl Viewport {
    /// Creates a new viewport with default zoom limits
    pub fn new(center: LatLng, zoom: u8, size: Point) -> Self {
        Self {
            center: center.normalized(),
            zoom: zoom.clamp(0, 19),
            min_zoom: 0,
            max_zoom: 19,
            size,
        }
    }

    /// Sets the zoom limits, clamping the current zoom into them
    pub fn set_zoom_limits(&mut self, min_zoom: u8, max_zoom: u8) {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self.zoom = self.zoom.clamp(min_zoom, max_zoom);
    }

    /// Sets the center, re-establishing the coordinate invariants
    pub fn set_center(&mut self, center: LatLng) {
        self.center = center.normalized();
    }

    /// Sets the viewport size in pixels
    pub fn set_size(&mut self, size: Point) {
        self.size = size;
    }

    /// Moves the view by a pixel delta: the delta is converted to tile
    /// space, subtracted from the center's fractional tile coordinates,
    /// and converted back.
    pub fn pan(&mut self, delta: Point) {
        let center_tile = geo::lat_lng_to_tile(&self.center, self.zoom);
        let tile = TILE_SIZE as f64;
        let new_x = center_tile.x - delta.x / tile;
        let new_y = center_tile.y - delta.y / tile;
        self.center = geo::tile_to_lat_lng(new_x, new_y, self.zoom).normalized();
    }

    /// Steps the zoom level by one within the configured limits.
    /// Returns whether the zoom changed; the center is left untouched.
    pub fn zoom_step(&mut self, direction: ZoomDirection) -> bool {
        let target = match direction {
            ZoomDirection::In if self.zoom < self.max_zoom => self.zoom + 1,
            ZoomDirection::Out if self.zoom > self.min_zoom => self.zoom - 1,
            _ => return false,
        };
        self.zoom = target;
        true
    }

    /// Projects a geographic position to pixel coordinates relative to the
    /// viewport's top-left corner, using the center projection as origin.
    /// Returns `None` when the viewport has no area.
    pub fn lat_lng_to_screen(&self, pos: &LatLng) -> Option<Point> {
        if self.size.x <= 0.0 || self.size.y <= 0.0 {
            return None;
        }
        let tile = TILE_SIZE as f64;
        let pt = geo::lat_lng_to_tile(pos, self.zoom);
        let center = geo::lat_lng_to_tile(&self.center, self.zoom);
        Some(Point::new(
            self.size.x / 2.0 + (pt.x - center.x) * tile,
            self.size.y / 2.0 + (pt.y - center.y) * tile,
        ))
    }

    /// Computes the tile slots covering the viewport plus a one-tile
    /// margin on each side. Rows outside the tile pyramid are skipped;
    /// columns wrap across the antimeridian.
    pub fn visible_tiles(&self) -> Vec<TileSlot> {
        if self.size.x <= 0.0 || self.size.y <= 0.0 {
            return Vec::new();
        }
        let tile = TILE_SIZE as f64;
        let center = geo::lat_lng_to_tile(&self.center, self.zoom);
        let tiles_x = (self.size.x / tile).ceil() as i64 + 2;
        let tiles_y = (self.size.y / tile).ceil() as i64 + 2;
        let start_x = (center.x - tiles_x as f64 / 2.0).floor() as i64;
        let start_y = (center.y - tiles_y as f64 / 2.0).floor() as i64;

        let mut slots = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for grid_x in start_x..start_x + tiles_x {
            for grid_y in start_y..start_y + tiles_y {
                if let Some(coord) = TileCoord::wrapped(self.zoom, grid_x, grid_y) {
                    slots.push(TileSlot {
                        coord,
                        grid_x,
                        grid_y,
                    });
                }
            }
        }
        slots
    }

    /// Screen position of a tile slot's top-left corner
    pub fn tile_origin(&self, slot: &TileSlot) -> Point {
        let tile = TILE_SIZE as f64;
        let center = geo::lat_lng_to_tile(&self.center, self.zoom);
        Point::new(
            self.size.x / 2.0 + (slot.grid_x as f64 - center.x) * tile,
            self.size.y / 2.0 + (slot.grid_y as f64 - center.y) * tile,
        )
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(LatLng::default(), 0, Point::new(800.0, 600.0))
    }
}
