//! Tile id → bounding box lookup
//!
//! Built once from the metadata document and never mutated afterwards.
//! Intersection queries go through an R-tree; the closed-interval test in
//! [`GeoBounds::intersects`] has the final word.

use super::metadata::GridMetadata;
use crate::core::geo::{GeoBounds, TileBBox};
use crate::prelude::HashMap;
use crate::tiles::loader::TileFetcher;
use crate::tiles::types::TileId;
use crate::{Error, Result};
use rstar::{RTree, RTreeObject, AABB};

/// One cell of the published grid
#[derive(Debug, Clone, PartialEq)]
pub struct GridTile {
    pub id: TileId,
    pub bbox: TileBBox,
}

impl GridTile {
    pub fn new(id: impl Into<TileId>, bbox: TileBBox) -> Self {
        Self {
            id: id.into(),
            bbox,
        }
    }
}

impl RTreeObject for GridTile {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_lon, self.bbox.min_lat],
            [self.bbox.max_lon, self.bbox.max_lat],
        )
    }
}

#[derive(Debug, Default)]
pub struct GridIndex {
    tiles: HashMap<TileId, TileBBox>,
    rtree: RTree<GridTile>,
}

impl GridIndex {
    /// Fetches and indexes the metadata document.
    ///
    /// Any failure, transport or parse, surfaces as [`Error::MetadataLoad`].
    pub async fn load(fetcher: &dyn TileFetcher) -> Result<Self> {
        let metadata = fetcher.fetch_metadata().await.map_err(|e| match e {
            Error::MetadataLoad { .. } => e,
            other => Error::MetadataLoad {
                reason: other.to_string(),
            },
        })?;
        let index = Self::from_metadata(metadata);
        log::info!("grid index loaded with {} tiles", index.len());
        Ok(index)
    }

    pub fn from_metadata(metadata: GridMetadata) -> Self {
        let tiles = metadata.grids.into_iter().filter_map(|(id, entry)| {
            if entry.bounds.is_valid() {
                Some(GridTile::new(id, entry.bounds))
            } else {
                log::warn!("skipping grid tile {} with inverted bounds", id);
                None
            }
        });
        Self::from_tiles(tiles)
    }

    pub fn from_tiles(tiles: impl IntoIterator<Item = GridTile>) -> Self {
        let tiles: Vec<GridTile> = tiles.into_iter().collect();
        let lookup = tiles
            .iter()
            .map(|tile| (tile.id.clone(), tile.bbox))
            .collect();
        Self {
            tiles: lookup,
            rtree: RTree::bulk_load(tiles),
        }
    }

    pub fn lookup(&self, id: &TileId) -> Option<&TileBBox> {
        self.tiles.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = (&TileId, &TileBBox)> {
        self.tiles.iter()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tiles whose bbox overlaps or touches `bounds`, in no particular order
    pub fn intersecting(&self, bounds: &GeoBounds) -> Vec<&GridTile> {
        if !bounds.is_valid() {
            // The envelope would normalise inverted corners; apply the raw test instead
            return self
                .rtree
                .iter()
                .filter(|tile| bounds.intersects(&tile.bbox))
                .collect();
        }

        let envelope = AABB::from_corners([bounds.west, bounds.south], [bounds.east, bounds.north]);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|tile| bounds.intersects(&tile.bbox))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::metadata::GridEntry;

    fn grid() -> GridIndex {
        // 4x4 grid of half-degree cells starting at (-98, 30)
        let mut tiles = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                let min_lon = -98.0 + col as f64 * 0.5;
                let min_lat = 30.0 + row as f64 * 0.5;
                tiles.push(GridTile::new(
                    format!("grid_{}_{}", row, col),
                    TileBBox::new(min_lon, min_lon + 0.5, min_lat, min_lat + 0.5),
                ));
            }
        }
        GridIndex::from_tiles(tiles)
    }

    fn ids(tiles: Vec<&GridTile>) -> Vec<String> {
        let mut ids: Vec<String> = tiles.iter().map(|t| t.id.to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_lookup() {
        let grid = grid();
        assert_eq!(grid.len(), 16);
        let bbox = grid.lookup(&TileId::from("grid_1_2")).unwrap();
        assert_eq!(*bbox, TileBBox::new(-97.0, -96.5, 30.5, 31.0));
        assert!(grid.lookup(&TileId::from("grid_9_9")).is_none());
    }

    #[test]
    fn test_intersecting_interior() {
        let grid = grid();
        let view = GeoBounds::new(-97.9, -97.6, 30.1, 30.4);
        assert_eq!(ids(grid.intersecting(&view)), vec!["grid_0_0"]);
    }

    #[test]
    fn test_intersecting_includes_touching_edges() {
        let grid = grid();
        // Exactly the bbox of grid_1_1; all eight neighbours touch it
        let view = GeoBounds::new(-97.5, -97.0, 30.5, 31.0);
        assert_eq!(grid.intersecting(&view).len(), 9);
    }

    #[test]
    fn test_intersecting_matches_linear_scan() {
        let grid = grid();
        let views = [
            GeoBounds::new(-97.3, -96.2, 30.7, 31.9),
            GeoBounds::new(-100.0, -99.0, 30.0, 31.0),
            GeoBounds::new(-98.0, -96.0, 30.0, 32.0),
            GeoBounds::new(-96.0, -95.0, 32.0, 33.0),
        ];
        for view in views {
            let linear: Vec<String> = {
                let mut ids: Vec<String> = grid
                    .all()
                    .filter(|(_, bbox)| view.intersects(bbox))
                    .map(|(id, _)| id.to_string())
                    .collect();
                ids.sort();
                ids
            };
            assert_eq!(ids(grid.intersecting(&view)), linear, "{:?}", view);
        }
    }

    #[test]
    fn test_inverted_viewport_uses_literal_test() {
        let grid = grid();
        let inverted = GeoBounds::new(-96.5, -97.9, 30.0, 32.0);
        let expected = grid
            .all()
            .filter(|(_, bbox)| inverted.intersects(bbox))
            .count();
        assert_eq!(grid.intersecting(&inverted).len(), expected);
    }

    #[test]
    fn test_metadata_with_inverted_tile_skipped() {
        let mut metadata = GridMetadata::default();
        metadata.grids.insert(
            TileId::from("good"),
            GridEntry {
                bounds: TileBBox::new(0.0, 1.0, 0.0, 1.0),
                feature_count: None,
            },
        );
        metadata.grids.insert(
            TileId::from("bad"),
            GridEntry {
                bounds: TileBBox::new(1.0, 0.0, 0.0, 1.0),
                feature_count: None,
            },
        );
        let grid = GridIndex::from_metadata(metadata);
        assert_eq!(grid.len(), 1);
        assert!(grid.lookup(&TileId::from("good")).is_some());
    }
}
