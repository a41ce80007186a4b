//! Prelude module for common tilegrid types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tilegrid::prelude::*;`

pub use crate::core::{
    config::{CacheProfile, TileGridOptions, VisibleTilePolicy},
    geo::{GeoBounds, LatLng, TileBBox},
};

pub use crate::data::geojson::{GeoJson, GeoJsonFeature, PropertyRange};

pub use crate::grid::{
    index::{GridIndex, GridTile},
    metadata::GridMetadata,
};

pub use crate::render::{memory::MemorySurface, LayerSpec, RenderAdapter, SourceSpec, SurfaceError};

pub use crate::session::{HeatmapSession, MapEvent, TickReport};

pub use crate::style::{
    applier::{PaintRule, StyleApplier},
    color::Color,
    filter::{Bracket, FilterConfig, FilterWarning, Tier},
};

pub use crate::tiles::{
    cache::{ReconcileReport, TileCache, TileOutcome},
    loader::{HttpTileFetcher, TileFetcher},
    source::{StaticTileSource, TileSource},
    types::{CacheEntry, CacheStats, RenderHandles, TileId, TileResult, TileState},
};

pub use crate::traits::ViewportAware;

pub use crate::viewport::tracker::{SettledView, ViewportTracker};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::{Error as TileGridError, Result};

pub use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
