use crate::core::geo::TileBBox;
use crate::tiles::types::TileId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `metadata.json` document: `{ "grids": { "<id>": { "bounds": {...} } } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    #[serde(default)]
    pub grids: HashMap<TileId, GridEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridEntry {
    pub bounds: TileBBox,
    /// Published by some grid generators, unused by the cache itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<u64>,
}

impl GridMetadata {
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}
