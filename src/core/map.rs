use crate::core::config::MapConfig;
use crate::core::geo::{LatLng, Point, TileCoord};
use crate::core::viewport::{Viewport, ZoomDirection};
use crate::tiles::fetch::FetchDispatcher;
use crate::tiles::memory::TileMemoryCache;
use crate::tiles::source::TemplateSource;
use crate::tiles::store::TileStore;
use crate::tiles::transport::{HttpTransport, TileTransport};
use crate::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A caller-supplied point of interest pinned to the map. The view never
/// creates or drops markers on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    pub position: LatLng,
    pub label: String,
}

impl Marker {
    pub fn new(id: impl Into<String>, position: LatLng, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position,
            label: label.into(),
        }
    }
}

/// A tile ready to draw: the decoded image and the screen position of its
/// top-left corner.
#[derive(Debug, Clone)]
pub struct PlacedTile {
    pub coord: TileCoord,
    pub origin: Point,
    pub image: Arc<DynamicImage>,
}

/// A marker projected into screen space
#[derive(Debug, Clone)]
pub struct PlacedMarker {
    pub id: String,
    pub label: String,
    pub position: Point,
}

/// Output of one render pass. It contains only what is currently
/// required; anything placed on a previous pass and absent here has been
/// released.
#[derive(Debug, Clone, Default)]
pub struct RenderList {
    pub tiles: Vec<PlacedTile>,
    pub markers: Vec<PlacedMarker>,
}

/// Everything a render pass reads or writes, behind one reader-writer
/// lock per view.
struct MapState {
    viewport: Viewport,
    cache: TileMemoryCache,
    markers: Vec<Marker>,
}

/// Interactive tile-map viewport: owns pan/zoom state, merges fetch
/// results, and produces render lists.
///
/// `render` is the single consumer of the fetch result channel and the
/// only mutator of the tile cache on the merge path; it takes `&mut self`
/// to keep it that way. All other operations take `&self` and go through
/// the state lock.
pub struct MapView {
    state: RwLock<MapState>,
    dispatcher: FetchDispatcher,
    store: Arc<TileStore>,
    hit_radius: f64,
}

impl MapView {
    /// Builds a view backed by the reqwest transport and the template
    /// tile source from `config`. Must be called from within a tokio
    /// runtime.
    pub fn new(config: MapConfig, center: LatLng, zoom: u8) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.server)?);
        Self::with_transport(config, center, zoom, transport)
    }

    /// Dependency-injection seam for tests and embedders that bring their
    /// own transport. Must be called from within a tokio runtime.
    pub fn with_transport(
        config: MapConfig,
        center: LatLng,
        zoom: u8,
        transport: Arc<dyn TileTransport>,
    ) -> Result<Self> {
        let store = Arc::new(match &config.cache_dir {
            Some(dir) => TileStore::open(dir.clone()),
            None => TileStore::disabled(),
        });
        let source = Arc::new(TemplateSource::new(&config.server));
        let dispatcher = FetchDispatcher::new(
            source,
            transport,
            Arc::clone(&store),
            config.result_buffer,
            config.send_timeout(),
        );

        let mut viewport = Viewport::new(center, zoom, Point::new(0.0, 0.0));
        viewport.set_zoom_limits(config.min_zoom, config.max_zoom);

        Ok(Self {
            state: RwLock::new(MapState {
                viewport,
                cache: TileMemoryCache::new(config.memory_cache_tiles),
                markers: Vec::new(),
            }),
            dispatcher,
            store,
            hit_radius: config.marker_hit_radius,
        })
    }

    /// Appends caller-supplied markers
    pub fn add_markers(&self, markers: impl IntoIterator<Item = Marker>) {
        self.write().markers.extend(markers);
    }

    /// Pans the view by a pixel delta
    pub fn pan(&self, delta: Point) {
        self.write().viewport.pan(delta);
    }

    /// Steps the zoom level; returns whether it changed
    pub fn zoom(&self, direction: ZoomDirection) -> bool {
        self.write().viewport.zoom_step(direction)
    }

    /// Updates the pixel dimensions of the view
    pub fn resize(&self, size: Point) {
        self.write().viewport.set_size(size);
    }

    /// Snapshot of the current viewport state
    pub fn viewport(&self) -> Viewport {
        self.read().viewport.clone()
    }

    /// Hit-tests a tap against the marker list. Returns the first marker
    /// in insertion order within the hit radius; ties go to the earlier
    /// marker, not the nearer one.
    pub fn tap(&self, point: Point) -> Option<Marker> {
        let state = self.read();
        let radius_sq = self.hit_radius * self.hit_radius;
        for marker in &state.markers {
            let Some(screen) = state.viewport.lat_lng_to_screen(&marker.position) else {
                continue;
            };
            let dx = point.x - screen.x;
            let dy = point.y - screen.y;
            if dx * dx + dy * dy <= radius_sq {
                return Some(marker.clone());
            }
        }
        None
    }

    /// Whether fetch outcomes are waiting to be merged. UI glue can poll
    /// this to schedule a render pass when tiles arrive asynchronously.
    pub fn has_pending_results(&self) -> bool {
        self.dispatcher.has_pending_results()
    }

    /// Runs one render pass: merges completed fetches, recomputes the
    /// required tile set, resolves every slot through the in-memory
    /// cache, then the disk cache, then a fetch dispatch, and returns
    /// everything that can be drawn right now. Unresolved tiles simply
    /// stay absent and are retried on the next pass once their in-flight
    /// marker clears.
    pub fn render(&mut self) -> RenderList {
        self.merge_outcomes();

        let mut state = self.write();
        let slots = state.viewport.visible_tiles();
        if slots.is_empty() {
            return RenderList::default();
        }

        let mut tiles = Vec::with_capacity(slots.len());
        let mut to_fetch = Vec::new();
        for slot in &slots {
            let image = match state.cache.get(&slot.coord) {
                Some(image) => Some(image),
                None => match self.store.read(slot.coord) {
                    Some(decoded) => {
                        let image = Arc::new(decoded);
                        state.cache.insert(slot.coord, Arc::clone(&image));
                        Some(image)
                    }
                    None => {
                        to_fetch.push(slot.coord);
                        None
                    }
                },
            };
            if let Some(image) = image {
                tiles.push(PlacedTile {
                    coord: slot.coord,
                    origin: state.viewport.tile_origin(slot),
                    image,
                });
            }
        }

        let markers = state
            .markers
            .iter()
            .filter_map(|marker| {
                state
                    .viewport
                    .lat_lng_to_screen(&marker.position)
                    .map(|position| PlacedMarker {
                        id: marker.id.clone(),
                        label: marker.label.clone(),
                        position,
                    })
            })
            .collect();
        drop(state);

        // The dispatcher skips anything already in flight, so a slot is
        // fetched at most once per pass no matter how often it appears.
        for coord in to_fetch {
            self.dispatcher.dispatch(coord);
        }

        RenderList { tiles, markers }
    }

    /// Tears the view down. Pending fetches and handovers observe the
    /// stop signal and release their in-flight markers.
    pub fn close(&mut self) {
        self.dispatcher.shutdown();
    }

    fn merge_outcomes(&mut self) {
        let outcomes = self.dispatcher.drain();
        if outcomes.is_empty() {
            return;
        }
        let mut state = self.write();
        for outcome in outcomes {
            match outcome.result {
                Ok(image) => state.cache.insert(outcome.coord, image),
                Err(err) if err.is_not_found() => {
                    log::debug!("no tile at {:?}", outcome.coord);
                }
                Err(err) => {
                    log::warn!("tile {:?} unresolved: {}", outcome.coord, err);
                }
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MapState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MapState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for MapView {
    fn drop(&mut self) {
        self.close();
    }
}
