//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tilegrid::grid::metadata::{GridEntry, GridMetadata};
use tilegrid::{Error, GeoJson, Result, TileBBox, TileFetcher, TileId};
use tokio::sync::Semaphore;

/// How the scripted fetcher answers for one tile
#[derive(Debug, Clone)]
pub enum Reply {
    /// Resolve at once with [`tile_payload`]
    Ready,
    /// Resolve with [`tile_payload`] once [`ScriptedFetcher::release`] is called
    Gated,
    Fail(String),
    /// Never resolve
    Hang,
}

/// In-memory fetcher that records every call
pub struct ScriptedFetcher {
    metadata: GridMetadata,
    replies: Mutex<HashMap<TileId, Reply>>,
    gates: Mutex<HashMap<TileId, Arc<Semaphore>>>,
    calls: Mutex<Vec<TileId>>,
}

impl ScriptedFetcher {
    pub fn new(tiles: &[(&str, TileBBox)]) -> Arc<Self> {
        let grids = tiles
            .iter()
            .map(|(id, bounds)| {
                (
                    TileId::from(*id),
                    GridEntry {
                        bounds: *bounds,
                        feature_count: None,
                    },
                )
            })
            .collect();
        Arc::new(Self {
            metadata: GridMetadata { grids },
            replies: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn reply(&self, id: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(TileId::from(id), reply);
    }

    /// Lets one gated fetch of `id` complete
    pub fn release(&self, id: &str) {
        self.gate(&TileId::from(id)).add_permits(1);
    }

    pub fn calls(&self, id: &str) -> usize {
        let id = TileId::from(id);
        self.calls.lock().unwrap().iter().filter(|c| **c == id).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn gate(&self, id: &TileId) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }
}

#[async_trait]
impl TileFetcher for ScriptedFetcher {
    async fn fetch_metadata(&self) -> Result<GridMetadata> {
        Ok(self.metadata.clone())
    }

    async fn fetch_tile(&self, id: &TileId) -> Result<GeoJson> {
        self.calls.lock().unwrap().push(id.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or(Reply::Ready);

        match reply {
            Reply::Ready => Ok(tile_payload()),
            Reply::Gated => {
                let gate = self.gate(id);
                let permit = gate.acquire().await.map_err(|e| Error::TileFetch {
                    id: id.clone(),
                    reason: e.to_string(),
                })?;
                permit.forget();
                Ok(tile_payload())
            }
            Reply::Fail(reason) => Err(Error::TileFetch {
                id: id.clone(),
                reason,
            }),
            Reply::Hang => futures::future::pending().await,
        }
    }
}

/// One polygon with both income-tier counts
pub fn tile_payload() -> GeoJson {
    let json = r#"{
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": { "kids_250k": 1300, "kids_500k": 620 },
            "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }
        }]
    }"#;
    GeoJson::from_slice(json.as_bytes()).unwrap()
}

pub fn ids(names: &[&str]) -> Vec<TileId> {
    names.iter().map(|n| TileId::from(*n)).collect()
}

/// Square cell of `size` degrees with its south-west corner at (lon, lat)
pub fn cell(lon: f64, lat: f64, size: f64) -> TileBBox {
    TileBBox::new(lon, lon + size, lat, lat + size)
}

/// Yields to spawned fetches until `id` has been requested `n` times
pub async fn wait_for_calls(fetcher: &ScriptedFetcher, id: &str, n: usize) {
    for _ in 0..1_000 {
        if fetcher.calls(id) >= n {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("{} was requested {} times, expected {}", id, fetcher.calls(id), n);
}
