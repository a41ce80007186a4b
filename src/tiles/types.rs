//! Core data types for the tile cache

use crate::{
    data::geojson::GeoJson,
    prelude::{Arc, Instant},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a grid tile as published in the metadata document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(String);

impl TileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render-surface source id for this tile
    pub fn source_id(&self) -> String {
        format!("source-{}", self.0)
    }

    /// Render-surface layer id for this tile
    pub fn layer_id(&self) -> String {
        format!("layer-{}", self.0)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a cached tile.
///
/// `Failed` is the retryable flavour of `Unloaded`: the last attempt errored or
/// timed out, nothing is registered, and the tile is admissible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

impl TileState {
    /// Whether reconcile may start a fetch for a tile in this state
    pub fn is_admissible(&self) -> bool {
        matches!(self, TileState::Unloaded | TileState::Failed)
    }
}

/// Ids of everything registered on the render surface for one tile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderHandles {
    pub source_id: String,
    pub layer_id: String,
}

impl RenderHandles {
    pub fn for_tile(id: &TileId) -> Self {
        Self {
            source_id: id.source_id(),
            layer_id: id.layer_id(),
        }
    }
}

/// Per-tile bookkeeping owned by the cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: TileId,
    pub state: TileState,
    pub load_started_at: Option<Instant>,
    pub retry_count: u32,
    pub render_handles: Option<RenderHandles>,
    /// Admission stamp; results carrying another generation are discarded
    pub generation: u64,
    /// Left the visible set while loading; its result will be discarded
    pub stale: bool,
    pub data: Option<Arc<GeoJson>>,
    pub last_error: Option<String>,
}

impl CacheEntry {
    pub fn new(id: TileId) -> Self {
        Self {
            id,
            state: TileState::Unloaded,
            load_started_at: None,
            retry_count: 0,
            render_handles: None,
            generation: 0,
            stale: false,
            data: None,
            last_error: None,
        }
    }

    pub fn mark_loading(&mut self, generation: u64, now: Instant) {
        self.state = TileState::Loading;
        self.generation = generation;
        self.load_started_at = Some(now);
        self.stale = false;
    }

    pub fn mark_loaded(&mut self, handles: RenderHandles, data: Arc<GeoJson>) {
        self.state = TileState::Loaded;
        self.load_started_at = None;
        self.render_handles = Some(handles);
        self.data = Some(data);
        self.retry_count = 0;
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = TileState::Failed;
        self.load_started_at = None;
        self.render_handles = None;
        self.data = None;
        self.stale = false;
        self.retry_count += 1;
        self.last_error = Some(error);
    }

    /// Time spent in `Loading`, if loading
    pub fn loading_for(&self, now: Instant) -> Option<std::time::Duration> {
        match (self.state, self.load_started_at) {
            (TileState::Loading, Some(started)) => Some(now.saturating_duration_since(started)),
            _ => None,
        }
    }
}

/// Completion of one fetch, matched back to its entry by id and generation
#[derive(Debug)]
pub struct TileResult {
    pub id: TileId,
    pub generation: u64,
    pub data: crate::Result<GeoJson>,
}

/// Snapshot of cache counters
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub unloaded: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
    /// Tiles out of the cache with surface leftovers awaiting removal
    pub orphaned: usize,
    pub fetches_started: u64,
    pub registrations: u64,
    pub evictions: u64,
    pub stale_discards: u64,
    pub timeouts: u64,
    pub failures: u64,
}
