//! # tileview
//!
//! A headless, async-aware slippy-map viewport engine.
//!
//! The crate maintains a scrollable, zoomable raster map built from
//! fixed-size image tiles fetched from a remote tile server, cached on
//! disk, and composited with point markers. It draws nothing itself:
//! every render pass produces a [`RenderList`](core::map::RenderList) of
//! placed tiles and markers for a UI layer to paint.

pub mod core;
pub mod prefetch;
pub mod prelude;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    config::{MapConfig, TileServerConfig},
    geo::{LatLng, LatLngBounds, Point, TileCoord},
    map::{MapView, Marker, PlacedMarker, PlacedTile, RenderList},
    viewport::{TileSlot, Viewport, ZoomDirection},
};

pub use crate::tiles::{
    fetch::{FetchDispatcher, FetchError, FetchOutcome},
    memory::TileMemoryCache,
    source::{TemplateSource, TileSource},
    store::TileStore,
    transport::{HttpTransport, TileTransport, TransportResponse},
};

pub use crate::prefetch::{PrefetchJob, PrefetchReport};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("tile caching is disabled")]
    CacheDisabled,
}

/// Error type alias for convenience
pub type Error = MapError;
