pub mod cache;
pub mod loader;
pub mod source;
pub mod types;

// Re-exports for convenience
pub use cache::TileCache;
pub use loader::{HttpTileFetcher, TileFetcher};
pub use source::{StaticTileSource, TileSource};
pub use types::{CacheEntry, CacheStats, RenderHandles, TileId, TileResult, TileState};
