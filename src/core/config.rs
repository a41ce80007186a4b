//! Configuration system for tile loading behaviour
//!
//! Options can be built from a preset profile, deserialized from JSON, or
//! assembled by hand. Every field has a default so partial JSON documents are
//! accepted.

use crate::core::constants::{
    FORCE_RECONCILE_INTERVAL_MS, MAX_CONCURRENT_TILES, MIN_TILE_ZOOM, REQUEST_TIMEOUT_MS,
    TICK_INTERVAL_MS, TILE_LOAD_TIMEOUT_MS, VIEWPORT_DEBOUNCE_MS, VISIBLE_TILES_BASE,
    VISIBLE_TILES_CEILING,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheProfile {
    Balanced,
    LowResource,
    HighPerformance,
    Custom(TileGridOptions),
}

impl CacheProfile {
    pub fn resolve(&self) -> TileGridOptions {
        match self {
            Self::Balanced => TileGridOptions::default(),
            Self::LowResource => TileGridOptions {
                max_concurrent_tiles: 2,
                tile_timeout_ms: 8_000,
                debounce_ms: 200,
                visible_tiles: VisibleTilePolicy {
                    min_zoom: 9.0,
                    base: 40,
                    ceiling: 80,
                },
                force_reconcile_interval_ms: 2_000,
                tick_interval_ms: 33,
                ..TileGridOptions::default()
            },
            Self::HighPerformance => TileGridOptions {
                max_concurrent_tiles: 16,
                tile_timeout_ms: 4_000,
                debounce_ms: 60,
                visible_tiles: VisibleTilePolicy {
                    min_zoom: 7.0,
                    base: 100,
                    ceiling: 250,
                },
                force_reconcile_interval_ms: 500,
                ..TileGridOptions::default()
            },
            Self::Custom(options) => options.clone(),
        }
    }
}

impl Default for CacheProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Zoom gate plus the zoom-scaled cap on how many tiles may be cached at once.
///
/// The cap is `min(ceiling, floor(base * zoom / min_zoom))`, never below one
/// once the zoom gate has been passed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibleTilePolicy {
    pub min_zoom: f64,
    pub base: usize,
    pub ceiling: usize,
}

impl VisibleTilePolicy {
    /// Whether tiles are shown at all at this zoom
    pub fn admits(&self, zoom: f64) -> bool {
        zoom >= self.min_zoom
    }

    /// Maximum number of tiles that may be `Loading` or `Loaded` at this zoom
    pub fn max_tiles(&self, zoom: f64) -> usize {
        if !self.admits(zoom) {
            return 0;
        }
        let scaled = (self.base as f64 * zoom / self.min_zoom).floor();
        let scaled = if scaled.is_finite() { scaled as usize } else { self.ceiling };
        scaled.min(self.ceiling).max(1)
    }
}

impl Default for VisibleTilePolicy {
    fn default() -> Self {
        Self {
            min_zoom: MIN_TILE_ZOOM,
            base: VISIBLE_TILES_BASE,
            ceiling: VISIBLE_TILES_CEILING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileGridOptions {
    /// Prefix for `metadata.json` and `tiles/{id}.geojson`
    pub base_url: String,
    pub max_concurrent_tiles: usize,
    pub tile_timeout_ms: u64,
    pub debounce_ms: u64,
    pub visible_tiles: VisibleTilePolicy,
    pub force_reconcile_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for TileGridOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            max_concurrent_tiles: MAX_CONCURRENT_TILES,
            tile_timeout_ms: TILE_LOAD_TIMEOUT_MS,
            debounce_ms: VIEWPORT_DEBOUNCE_MS,
            visible_tiles: VisibleTilePolicy::default(),
            force_reconcile_interval_ms: FORCE_RECONCILE_INTERVAL_MS,
            tick_interval_ms: TICK_INTERVAL_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
        }
    }
}

impl TileGridOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parses options from a JSON document and validates them
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_tiles == 0 {
            return Err(Error::Config("max_concurrent_tiles must be at least 1".into()));
        }
        if self.tile_timeout_ms == 0 {
            return Err(Error::Config("tile_timeout_ms must be positive".into()));
        }
        let policy = &self.visible_tiles;
        if !(policy.min_zoom > 0.0) || !policy.min_zoom.is_finite() {
            return Err(Error::Config(format!(
                "visible_tiles.min_zoom must be a positive number, got {}",
                policy.min_zoom
            )));
        }
        if policy.base > policy.ceiling {
            return Err(Error::Config(format!(
                "visible_tiles.base ({}) exceeds ceiling ({})",
                policy.base, policy.ceiling
            )));
        }
        Ok(())
    }

    pub fn tile_timeout(&self) -> Duration {
        Duration::from_millis(self.tile_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn force_reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.force_reconcile_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
