use crate::tiles::types::TileId;

/// Trait representing anything that can produce data URLs for the tile grid.
pub trait TileSource: Send + Sync {
    /// URL of the grid metadata document.
    fn metadata_url(&self) -> String;

    /// URL of the GeoJSON payload for `id`.
    fn tile_url(&self, id: &TileId) -> String;
}

/// Static file layout: `{base}/metadata.json` and `{base}/tiles/{id}.geojson`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTileSource {
    base_url: String,
}

impl StaticTileSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl TileSource for StaticTileSource {
    fn metadata_url(&self) -> String {
        format!("{}/metadata.json", self.base_url)
    }

    fn tile_url(&self, id: &TileId) -> String {
        format!("{}/tiles/{}.geojson", self.base_url, id)
    }
}
