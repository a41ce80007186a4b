//! Core constants for the tile pipeline.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Maximum number of tiles allowed in `Loading` at once.
pub const MAX_CONCURRENT_TILES: usize = 6;

/// A tile still loading after this many milliseconds is treated as failed.
pub const TILE_LOAD_TIMEOUT_MS: u64 = 5_000;

/// Trailing-edge quiescence window applied to viewport change notifications.
pub const VIEWPORT_DEBOUNCE_MS: u64 = 100;

/// Below this zoom the visible set is empty regardless of bounds.
pub const MIN_TILE_ZOOM: f64 = 8.0;

/// Visible tile budget at the minimum zoom (scales linearly with zoom).
pub const VISIBLE_TILES_BASE: usize = 75;

/// Hard ceiling on the visible tile budget.
pub const VISIBLE_TILES_CEILING: usize = 150;

/// How often reconcile is forced while tiles are still loading.
pub const FORCE_RECONCILE_INTERVAL_MS: u64 = 1_000;

/// Session loop tick (~60fps).
pub const TICK_INTERVAL_MS: u64 = 16;

/// Per-request network timeout for the HTTP client.
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Fully transparent fill.
pub const TRANSPARENT: &str = "rgba(0, 0, 0, 0)";

/// Outline applied to every tile layer.
pub const TILE_OUTLINE_COLOR: &str = "rgba(0, 0, 0, 0.2)";

/// Fill opacity applied to every tile layer.
pub const TILE_FILL_OPACITY: f64 = 0.8;

/// Fallback bracket colors, highest bracket first.
pub const DEFAULT_PALETTE: [&str; 6] = [
    "rgba(255, 59, 59, 0.4)",  // red
    "rgba(255, 149, 5, 0.4)",  // orange
    "rgba(255, 215, 0, 0.4)",  // yellow
    "rgba(76, 187, 23, 0.4)",  // green
    "rgba(0, 102, 204, 0.4)",  // blue
    "rgba(102, 0, 153, 0.4)",  // purple
];
