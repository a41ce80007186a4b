//! Headless render surface
//!
//! Keeps the registered sources and layers in memory. Used by the headless
//! driver and by tests; it can also be told to reject specific calls.

use super::{LayerSpec, RenderAdapter, SourceSpec, SurfaceError};
use crate::prelude::{HashMap, HashSet};
use serde_json::Value;

#[derive(Debug, Default)]
pub struct MemorySurface {
    sources: HashMap<String, SourceSpec>,
    /// Layers in draw order
    layers: Vec<LayerSpec>,
    rejected_layers: HashSet<String>,
    rejected_removals: HashSet<String>,
    source_adds: usize,
    layer_adds: usize,
    paint_updates: usize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `add_layer` for `layer_id` fail until [`Self::accept_layer`]
    pub fn reject_layer(&mut self, layer_id: impl Into<String>) {
        self.rejected_layers.insert(layer_id.into());
    }

    pub fn accept_layer(&mut self, layer_id: &str) {
        self.rejected_layers.remove(layer_id);
    }

    /// Make removals of `id` (layer or source) fail until [`Self::accept_removal`]
    pub fn reject_removal(&mut self, id: impl Into<String>) {
        self.rejected_removals.insert(id.into());
    }

    pub fn accept_removal(&mut self, id: &str) {
        self.rejected_removals.remove(id);
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn paint_property(&self, layer_id: &str, property: &str) -> Option<&Value> {
        self.layer(layer_id)?.paint.get(property)
    }

    pub fn layer_ids(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.id.as_str()).collect()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Total successful `add_source` calls
    pub fn source_adds(&self) -> usize {
        self.source_adds
    }

    /// Total successful `add_layer` calls
    pub fn layer_adds(&self) -> usize {
        self.layer_adds
    }

    /// Total successful `set_paint_property` calls
    pub fn paint_updates(&self) -> usize {
        self.paint_updates
    }
}

impl RenderAdapter for MemorySurface {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }

    fn add_source(&mut self, id: &str, spec: SourceSpec) -> Result<(), SurfaceError> {
        if self.sources.contains_key(id) {
            return Err(SurfaceError(format!("source {} already exists", id)));
        }
        self.sources.insert(id.to_string(), spec);
        self.source_adds += 1;
        Ok(())
    }

    fn add_layer(&mut self, spec: LayerSpec) -> Result<(), SurfaceError> {
        if self.rejected_layers.contains(&spec.id) {
            return Err(SurfaceError(format!("layer {} rejected", spec.id)));
        }
        if self.has_layer(&spec.id) {
            return Err(SurfaceError(format!("layer {} already exists", spec.id)));
        }
        if !self.sources.contains_key(&spec.source) {
            return Err(SurfaceError(format!(
                "layer {} references missing source {}",
                spec.id, spec.source
            )));
        }
        self.layers.push(spec);
        self.layer_adds += 1;
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.rejected_removals.contains(id) {
            return Err(SurfaceError(format!("removal of {} rejected", id)));
        }
        let before = self.layers.len();
        self.layers.retain(|layer| layer.id != id);
        if self.layers.len() == before {
            return Err(SurfaceError(format!("layer {} does not exist", id)));
        }
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        if self.rejected_removals.contains(id) {
            return Err(SurfaceError(format!("removal of {} rejected", id)));
        }
        if self.layers.iter().any(|layer| layer.source == id) {
            return Err(SurfaceError(format!("source {} is still in use", id)));
        }
        self.sources
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError(format!("source {} does not exist", id)))
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        property: &str,
        value: Value,
    ) -> Result<(), SurfaceError> {
        let layer = self
            .layers
            .iter_mut()
            .find(|layer| layer.id == layer_id)
            .ok_or_else(|| SurfaceError(format!("layer {} does not exist", layer_id)))?;
        layer.paint.insert(property.to_string(), value);
        self.paint_updates += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::GeoJson;
    use crate::prelude::Arc;
    use serde_json::json;

    fn source() -> SourceSpec {
        SourceSpec::geojson(Arc::new(GeoJson::empty()))
    }

    #[test]
    fn test_add_and_remove() {
        let mut surface = MemorySurface::new();
        surface.add_source("source-a", source()).unwrap();
        surface.add_layer(LayerSpec::fill("layer-a", "source-a")).unwrap();
        assert!(surface.has_source("source-a"));
        assert!(surface.has_layer("layer-a"));

        // Source can't go while its layer exists
        assert!(surface.remove_source("source-a").is_err());
        surface.remove_layer("layer-a").unwrap();
        surface.remove_source("source-a").unwrap();
        assert_eq!(surface.layer_count(), 0);
        assert_eq!(surface.source_count(), 0);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut surface = MemorySurface::new();
        surface.add_source("source-a", source()).unwrap();
        assert!(surface.add_source("source-a", source()).is_err());
        surface.add_layer(LayerSpec::fill("layer-a", "source-a")).unwrap();
        assert!(surface.add_layer(LayerSpec::fill("layer-a", "source-a")).is_err());
        assert_eq!(surface.source_adds(), 1);
        assert_eq!(surface.layer_adds(), 1);
    }

    #[test]
    fn test_paint_property() {
        let mut surface = MemorySurface::new();
        surface.add_source("source-a", source()).unwrap();
        surface.add_layer(LayerSpec::fill("layer-a", "source-a")).unwrap();
        surface
            .set_paint_property("layer-a", "fill-color", json!("red"))
            .unwrap();
        assert_eq!(
            surface.paint_property("layer-a", "fill-color"),
            Some(&json!("red"))
        );
        assert!(surface
            .set_paint_property("layer-b", "fill-color", json!("red"))
            .is_err());
    }

    #[test]
    fn test_rejections() {
        let mut surface = MemorySurface::new();
        surface.add_source("source-a", source()).unwrap();
        surface.reject_layer("layer-a");
        assert!(surface.add_layer(LayerSpec::fill("layer-a", "source-a")).is_err());
        surface.accept_layer("layer-a");
        surface.add_layer(LayerSpec::fill("layer-a", "source-a")).unwrap();

        surface.reject_removal("layer-a");
        assert!(surface.remove_layer("layer-a").is_err());
        surface.accept_removal("layer-a");
        assert!(surface.remove_layer("layer-a").is_ok());
    }
}
