//! Host render surface seam
//!
//! The cache is strictly a consumer of the host engine's source/layer
//! registration API. Every call the cache makes is preceded by an existence
//! check, so implementations are free to reject duplicate adds.

pub mod memory;

use crate::core::constants::{TILE_FILL_OPACITY, TILE_OUTLINE_COLOR, TRANSPARENT};
use crate::data::geojson::GeoJson;
use crate::prelude::Arc;
use serde_json::{json, Map, Value};

/// The render surface rejected a call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SurfaceError(pub String);

/// GeoJSON source registered for one tile
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    pub data: Arc<GeoJson>,
}

impl SourceSpec {
    pub fn geojson(data: Arc<GeoJson>) -> Self {
        Self { data }
    }
}

/// Fill layer drawing one tile's source
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub paint: Map<String, Value>,
}

impl LayerSpec {
    /// A transparent fill layer; the style applier assigns `fill-color` later
    pub fn fill(id: impl Into<String>, source: impl Into<String>) -> Self {
        let mut paint = Map::new();
        paint.insert("fill-color".into(), json!(TRANSPARENT));
        paint.insert("fill-opacity".into(), json!(TILE_FILL_OPACITY));
        paint.insert("fill-outline-color".into(), json!(TILE_OUTLINE_COLOR));
        Self {
            id: id.into(),
            source: source.into(),
            paint,
        }
    }
}

/// Source/layer registry of the host map engine
pub trait RenderAdapter {
    fn has_source(&self, id: &str) -> bool;

    fn has_layer(&self, id: &str) -> bool;

    fn add_source(&mut self, id: &str, spec: SourceSpec) -> Result<(), SurfaceError>;

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), SurfaceError>;

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: Value,
    ) -> Result<(), SurfaceError>;
}
