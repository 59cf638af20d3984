//! Prelude module for common tileview types and traits
//!
//! Re-exports the most commonly used types for easy importing with
//! `use tileview::prelude::*;`

pub use crate::core::{
    config::{MapConfig, TileServerConfig},
    geo::{lat_lng_to_tile, tile_to_lat_lng, LatLng, LatLngBounds, Point, TileCoord, TILE_SIZE},
    map::{MapView, Marker, PlacedMarker, PlacedTile, RenderList},
    viewport::{TileSlot, Viewport, ZoomDirection},
};

pub use crate::tiles::{
    fetch::{FetchDispatcher, FetchError, FetchOutcome, InFlightSet},
    memory::TileMemoryCache,
    source::{TemplateSource, TileSource},
    store::TileStore,
    transport::{HttpTransport, TileTransport, TransportResponse},
};

pub use crate::prefetch::{PrefetchJob, PrefetchReport};

pub use crate::{Error as MapError, Result};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
