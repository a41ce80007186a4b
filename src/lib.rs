//! # tilegrid
//!
//! A viewport-driven spatial tile cache for demographic heatmap overlays.
//!
//! The crate decides, as a host map's viewport changes, which pre-partitioned
//! GeoJSON grid tiles to fetch, register with the host's render surface, retry
//! on failure or timeout, and evict. Styling of loaded tiles follows a filter
//! configuration pushed in by the host UI.

pub mod core;
pub mod data;
pub mod grid;
pub mod prelude;
pub mod render;
pub mod runtime;
pub mod session;
pub mod style;
pub mod tiles;
pub mod traits;
pub mod viewport;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{CacheProfile, TileGridOptions, VisibleTilePolicy},
    geo::{GeoBounds, LatLng, TileBBox},
};

pub use data::geojson::{GeoJson, GeoJsonFeature};

pub use grid::index::{GridIndex, GridTile};

pub use render::{memory::MemorySurface, LayerSpec, RenderAdapter, SourceSpec};

pub use session::HeatmapSession;

pub use style::{
    applier::{PaintRule, StyleApplier},
    filter::{Bracket, FilterConfig, Tier},
};

pub use tiles::{
    cache::TileCache,
    loader::{HttpTileFetcher, TileFetcher},
    source::{StaticTileSource, TileSource},
    types::{CacheEntry, TileId, TileState},
};

pub use viewport::tracker::ViewportTracker;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum TileGridError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Metadata load failed: {reason}")]
    MetadataLoad { reason: String },

    #[error("Tile {id} fetch failed: {reason}")]
    TileFetch { id: TileId, reason: String },

    #[error("Tile {id} timed out after {elapsed_ms}ms")]
    TileTimeout { id: TileId, elapsed_ms: u128 },

    #[error("Tile {id} registration failed: {reason}")]
    Registration { id: TileId, reason: String },

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Error type alias for convenience
pub type Error = TileGridError;
