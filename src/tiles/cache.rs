//! Per-tile lifecycle, fetch admission and eviction
//!
//! `TileCache` owns one [`CacheEntry`] per tile it has seen in a visible set.
//! [`TileCache::reconcile`] is synchronous: it times out stuck loads, evicts
//! tiles that left the view and starts fetches for newly visible ones, closest
//! first, without awaiting anything. Fetches run as detached tasks and report
//! back over a channel that [`TileCache::poll_results`] drains on the owner's
//! loop, so every state change happens on one thread without locks.
//!
//! Each admission stamps the entry with a fresh generation. A result is only
//! registered if its generation still matches, the entry is still `Loading`
//! and the tile is still wanted; everything else is dropped (soft
//! cancellation).

use super::loader::TileFetcher;
use super::types::{CacheEntry, CacheStats, RenderHandles, TileId, TileResult, TileState};
use crate::core::config::{TileGridOptions, VisibleTilePolicy};
use crate::data::geojson::{GeoJson, PropertyRange};
use crate::prelude::{Arc, Duration, HashMap, HashSet, Instant};
use crate::render::{LayerSpec, RenderAdapter, SourceSpec, SurfaceError};
use crate::runtime::{self, async_utils::async_delay, AsyncHandle};
use crate::style::applier::StyleApplier;
use crate::Error;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// What one reconcile pass did
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileReport {
    /// Loaded tiles unregistered and dropped
    pub evicted: Vec<TileId>,
    /// Loading tiles that left the view; their results will be discarded
    pub marked_stale: Vec<TileId>,
    /// Fetches started, in admission order
    pub admitted: Vec<TileId>,
    /// Loading tiles that exceeded the timeout
    pub timed_out: Vec<TileId>,
    /// Visible, admissible tiles left for a later pass by the caps
    pub deferred: usize,
    /// Tiles dropped from the cache whose surface cleanup failed part way
    pub orphaned: Vec<TileId>,
}

/// How one fetch completion was handled
#[derive(Debug)]
pub enum TileOutcome {
    Loaded(TileId),
    Failed { id: TileId, error: Error },
    /// Result no longer wanted: superseded, timed out or evicted
    Discarded(TileId),
}

impl TileOutcome {
    pub fn id(&self) -> &TileId {
        match self {
            TileOutcome::Loaded(id) | TileOutcome::Discarded(id) => id,
            TileOutcome::Failed { id, .. } => id,
        }
    }
}

pub struct TileCache {
    entries: HashMap<TileId, CacheEntry>,
    fetcher: Arc<dyn TileFetcher>,
    max_concurrent: usize,
    timeout: Duration,
    policy: VisibleTilePolicy,
    next_generation: u64,
    result_tx: Sender<TileResult>,
    result_rx: Receiver<TileResult>,
    /// Spawned fetch tasks by generation, pruned once finished
    inflight: HashMap<u64, Box<dyn AsyncHandle>>,
    /// Surface ids left behind by a failed unregistration, removed on a later pass
    orphans: HashMap<TileId, RenderHandles>,
    stats: CacheStats,
}

impl TileCache {
    pub fn new(fetcher: Arc<dyn TileFetcher>, options: &TileGridOptions) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            entries: HashMap::default(),
            fetcher,
            max_concurrent: options.max_concurrent_tiles.max(1),
            timeout: options.tile_timeout(),
            policy: options.visible_tiles,
            next_generation: 0,
            result_tx,
            result_rx,
            inflight: HashMap::default(),
            orphans: HashMap::default(),
            stats: CacheStats::default(),
        }
    }

    pub fn reconcile(
        &mut self,
        visible: &[TileId],
        zoom: f64,
        surface: &mut dyn RenderAdapter,
    ) -> ReconcileReport {
        self.reconcile_at(visible, zoom, surface, Instant::now())
    }

    /// Brings the cache in line with `visible` (closest first).
    ///
    /// Calling it again with the same set starts no fetch and registers
    /// nothing.
    pub fn reconcile_at(
        &mut self,
        visible: &[TileId],
        zoom: f64,
        surface: &mut dyn RenderAdapter,
        now: Instant,
    ) -> ReconcileReport {
        let wanted: HashSet<&TileId> = visible.iter().collect();
        let mut report = ReconcileReport::default();

        self.expire_stuck_loads(&wanted, now, &mut report);
        self.clean_orphans(&wanted, surface);
        self.evict_unwanted(&wanted, surface, &mut report);

        // A tile that came back into view before its fetch resolved keeps that fetch
        for id in visible {
            if let Some(entry) = self.entries.get_mut(id) {
                if entry.stale && entry.state == TileState::Loading {
                    log::debug!("tile {} visible again, keeping in-flight fetch", id);
                    entry.stale = false;
                }
            }
        }

        self.admit(visible, zoom, now, &mut report);

        if !report.admitted.is_empty() || !report.evicted.is_empty() {
            log::debug!(
                "reconcile: {} admitted, {} evicted, {} stale, {} timed out, {} deferred",
                report.admitted.len(),
                report.evicted.len(),
                report.marked_stale.len(),
                report.timed_out.len(),
                report.deferred
            );
        }
        report
    }

    fn expire_stuck_loads(
        &mut self,
        wanted: &HashSet<&TileId>,
        now: Instant,
        report: &mut ReconcileReport,
    ) {
        let timeout = self.timeout;
        let expired: Vec<(TileId, Duration)> = self
            .entries
            .values()
            .filter_map(|entry| {
                entry
                    .loading_for(now)
                    .filter(|elapsed| *elapsed > timeout)
                    .map(|elapsed| (entry.id.clone(), elapsed))
            })
            .collect();

        for (id, elapsed) in expired {
            let error = Error::TileTimeout {
                id: id.clone(),
                elapsed_ms: elapsed.as_millis(),
            };
            log::warn!("{}", error);
            self.stats.timeouts += 1;

            if wanted.contains(&id) {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.mark_failed(error.to_string());
                }
            } else {
                self.entries.remove(&id);
            }
            report.timed_out.push(id);
        }
    }

    fn evict_unwanted(
        &mut self,
        wanted: &HashSet<&TileId>,
        surface: &mut dyn RenderAdapter,
        report: &mut ReconcileReport,
    ) {
        let unwanted: Vec<TileId> = self
            .entries
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();

        for id in unwanted {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            let state = entry.state;
            match state {
                TileState::Loaded => {
                    let handles = entry
                        .render_handles
                        .clone()
                        .unwrap_or_else(|| RenderHandles::for_tile(&id));
                    self.entries.remove(&id);
                    match unregister(&id, &handles, surface) {
                        Ok(()) => {
                            self.stats.evictions += 1;
                            log::debug!("evicted tile {}", id);
                            report.evicted.push(id);
                        }
                        // Dropped from the cache anyway; the leftovers are
                        // removed on a later pass or before re-registering
                        Err(e) => {
                            log::warn!("{}", e);
                            self.orphans.insert(id.clone(), handles);
                            report.orphaned.push(id);
                        }
                    }
                }
                TileState::Loading => {
                    if !entry.stale {
                        entry.stale = true;
                        log::debug!("tile {} left the view while loading", id);
                        report.marked_stale.push(id);
                    }
                }
                TileState::Unloaded | TileState::Failed => {
                    self.entries.remove(&id);
                }
            }
        }
    }

    /// Retries removal of leftovers for tiles that are out of view.
    /// Leftovers of visible tiles are cleared when their fetch registers.
    fn clean_orphans(&mut self, wanted: &HashSet<&TileId>, surface: &mut dyn RenderAdapter) {
        let retry: Vec<TileId> = self
            .orphans
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();

        for id in retry {
            let Some(handles) = self.orphans.get(&id) else {
                continue;
            };
            match unregister(&id, handles, surface) {
                Ok(()) => {
                    self.orphans.remove(&id);
                    self.stats.evictions += 1;
                    log::debug!("removed leftovers of tile {}", id);
                }
                Err(e) => log::warn!("{}", e),
            }
        }
    }

    fn admit(&mut self, visible: &[TileId], zoom: f64, now: Instant, report: &mut ReconcileReport) {
        let loading = self.loading_count();
        let loaded = self.count(TileState::Loaded);
        let slots = self.max_concurrent.saturating_sub(loading);
        let budget = self.policy.max_tiles(zoom).saturating_sub(loading + loaded);
        let mut quota = slots.min(budget);

        let mut seen: HashSet<&TileId> = HashSet::default();
        let mut started = Vec::new();
        for id in visible {
            if !seen.insert(id) {
                continue;
            }
            let entry = self
                .entries
                .entry(id.clone())
                .or_insert_with(|| CacheEntry::new(id.clone()));
            if !entry.state.is_admissible() {
                continue;
            }
            if quota == 0 {
                report.deferred += 1;
                continue;
            }
            quota -= 1;

            self.next_generation += 1;
            entry.mark_loading(self.next_generation, now);
            started.push((id.clone(), self.next_generation));
        }

        for (id, generation) in started {
            log::debug!("admitting tile {} (generation {})", id, generation);
            self.spawn_fetch(id.clone(), generation);
            report.admitted.push(id);
        }
    }

    fn spawn_fetch(&mut self, id: TileId, generation: u64) {
        let fetcher = Arc::clone(&self.fetcher);
        let result_tx = self.result_tx.clone();
        let handle = runtime::spawn(async move {
            let data = fetcher.fetch_tile(&id).await;
            // The cache may be gone by now
            let _ = result_tx.send(TileResult {
                id,
                generation,
                data,
            });
        });
        self.inflight.insert(generation, handle);
        self.stats.fetches_started += 1;
    }

    /// Handles every fetch completion received so far, without blocking
    pub fn poll_results(
        &mut self,
        surface: &mut dyn RenderAdapter,
        styler: &StyleApplier,
    ) -> Vec<TileOutcome> {
        self.inflight.retain(|_, handle| !handle.is_finished());

        let mut outcomes = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            outcomes.push(self.handle_result(result, surface, styler));
        }
        outcomes
    }

    /// Polls until `expected` completions were handled or `timeout` elapsed
    pub async fn await_results(
        &mut self,
        surface: &mut dyn RenderAdapter,
        styler: &StyleApplier,
        expected: usize,
        timeout: Duration,
    ) -> Vec<TileOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::new();
        loop {
            outcomes.extend(self.poll_results(surface, styler));
            if outcomes.len() >= expected || Instant::now() >= deadline {
                return outcomes;
            }
            async_delay(Duration::from_millis(1)).await;
        }
    }

    fn handle_result(
        &mut self,
        result: TileResult,
        surface: &mut dyn RenderAdapter,
        styler: &StyleApplier,
    ) -> TileOutcome {
        let TileResult {
            id,
            generation,
            data,
        } = result;

        let stale = match self.entries.get(&id) {
            Some(entry) if entry.generation == generation && entry.state == TileState::Loading => {
                entry.stale
            }
            _ => {
                log::debug!("discarding superseded result for tile {}", id);
                self.stats.stale_discards += 1;
                return TileOutcome::Discarded(id);
            }
        };
        if stale {
            log::debug!("discarding result for tile {} that left the view", id);
            self.entries.remove(&id);
            self.stats.stale_discards += 1;
            return TileOutcome::Discarded(id);
        }

        let outcome = match data {
            Ok(geojson) => {
                let data = Arc::new(geojson);
                let handles = RenderHandles::for_tile(&id);
                let registered = match self.clear_orphan(&id, surface) {
                    Ok(()) => register(&id, &handles, &data, surface),
                    Err(e) => Err(e),
                };
                match registered {
                    Ok(()) => {
                        if let Some(entry) = self.entries.get_mut(&id) {
                            entry.mark_loaded(handles.clone(), data);
                        }
                        self.stats.registrations += 1;
                        log::info!("tile {} registered", id);
                        if let Err(e) = styler.apply(&id, &handles.layer_id, surface) {
                            log::warn!("styling tile {} failed: {}", id, e);
                        }
                        return TileOutcome::Loaded(id);
                    }
                    Err(error) => error,
                }
            }
            Err(error) => error,
        };

        log::warn!("{}", outcome);
        self.stats.failures += 1;
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.mark_failed(outcome.to_string());
        }
        TileOutcome::Failed { id, error: outcome }
    }

    /// Removes leftovers of an earlier registration so the new one starts clean
    fn clear_orphan(&mut self, id: &TileId, surface: &mut dyn RenderAdapter) -> crate::Result<()> {
        if let Some(handles) = self.orphans.get(id) {
            unregister(id, handles, surface)?;
            self.orphans.remove(id);
            log::debug!("removed leftovers of tile {} before registering", id);
        }
        Ok(())
    }

    /// Unregisters every loaded tile and forgets all entries.
    ///
    /// In-flight fetches are aborted. Returns how many tiles were unregistered.
    pub fn evict_all(&mut self, surface: &mut dyn RenderAdapter) -> usize {
        let mut evicted = 0;
        for (id, entry) in self.entries.drain() {
            if let (TileState::Loaded, Some(handles)) = (entry.state, &entry.render_handles) {
                match unregister(&id, handles, surface) {
                    Ok(()) => evicted += 1,
                    Err(e) => log::warn!("{}", e),
                }
            }
        }
        for (id, handles) in self.orphans.drain() {
            if let Err(e) = unregister(&id, &handles, surface) {
                log::warn!("{}", e);
            }
        }
        for (_, handle) in self.inflight.drain() {
            handle.cancel();
        }
        self.stats.evictions += evicted as u64;
        evicted
    }

    pub fn state(&self, id: &TileId) -> Option<TileState> {
        self.entries.get(id).map(|entry| entry.state)
    }

    pub fn entry(&self, id: &TileId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &TileId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn loaded_tiles(&self) -> impl Iterator<Item = (&TileId, &RenderHandles)> {
        self.entries.iter().filter_map(|(id, entry)| match entry.state {
            TileState::Loaded => entry.render_handles.as_ref().map(|h| (id, h)),
            _ => None,
        })
    }

    /// Ids currently in `state`, sorted
    pub fn ids_in(&self, state: TileState) -> Vec<TileId> {
        let mut ids: Vec<TileId> = self
            .entries
            .values()
            .filter(|entry| entry.state == state)
            .map(|entry| entry.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Tiles whose surface leftovers still await removal
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    pub fn loading_count(&self) -> usize {
        self.count(TileState::Loading)
    }

    pub fn has_loading(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.state == TileState::Loading)
    }

    fn count(&self, state: TileState) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state == state)
            .count()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            unloaded: self.count(TileState::Unloaded),
            loading: self.count(TileState::Loading),
            loaded: self.count(TileState::Loaded),
            failed: self.count(TileState::Failed),
            orphaned: self.orphans.len(),
            ..self.stats.clone()
        }
    }

    /// Range of a numeric feature property across all loaded tiles
    pub fn loaded_stats(&self, property: &str) -> Option<PropertyRange> {
        self.entries
            .values()
            .filter(|entry| entry.state == TileState::Loaded)
            .filter_map(|entry| entry.data.as_ref()?.property_range(property))
            .reduce(PropertyRange::merge)
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        for (_, handle) in self.inflight.drain() {
            handle.cancel();
        }
    }
}

fn registration_error(id: &TileId, error: SurfaceError) -> Error {
    Error::Registration {
        id: id.clone(),
        reason: error.0,
    }
}

/// Adds the tile's source and fill layer, skipping whatever already exists.
/// A rejected layer rolls back a source added by this call.
fn register(
    id: &TileId,
    handles: &RenderHandles,
    data: &Arc<GeoJson>,
    surface: &mut dyn RenderAdapter,
) -> crate::Result<()> {
    let mut added_source = false;
    if !surface.has_source(&handles.source_id) {
        surface
            .add_source(&handles.source_id, SourceSpec::geojson(Arc::clone(data)))
            .map_err(|e| registration_error(id, e))?;
        added_source = true;
    }

    if !surface.has_layer(&handles.layer_id) {
        let layer = LayerSpec::fill(handles.layer_id.as_str(), handles.source_id.as_str());
        if let Err(e) = surface.add_layer(layer) {
            if added_source {
                if let Err(rollback) = surface.remove_source(&handles.source_id) {
                    log::warn!("rolling back source for tile {} failed: {}", id, rollback);
                }
            }
            return Err(registration_error(id, e));
        }
    }
    Ok(())
}

/// Removes the tile's layer then its source, skipping whatever is already gone
fn unregister(
    id: &TileId,
    handles: &RenderHandles,
    surface: &mut dyn RenderAdapter,
) -> crate::Result<()> {
    if surface.has_layer(&handles.layer_id) {
        surface
            .remove_layer(&handles.layer_id)
            .map_err(|e| registration_error(id, e))?;
    }
    if surface.has_source(&handles.source_id) {
        surface
            .remove_source(&handles.source_id)
            .map_err(|e| registration_error(id, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::metadata::GridMetadata;
    use crate::render::memory::MemorySurface;
    use crate::Result;
    use async_trait::async_trait;

    /// Resolves every tile immediately with an empty collection
    struct InstantFetcher;

    #[async_trait]
    impl TileFetcher for InstantFetcher {
        async fn fetch_metadata(&self) -> Result<GridMetadata> {
            Ok(GridMetadata::default())
        }

        async fn fetch_tile(&self, _id: &TileId) -> Result<GeoJson> {
            Ok(GeoJson::empty())
        }
    }

    fn ids(names: &[&str]) -> Vec<TileId> {
        names.iter().map(|n| TileId::from(*n)).collect()
    }

    fn cache(max_concurrent: usize) -> TileCache {
        let options = TileGridOptions {
            max_concurrent_tiles: max_concurrent,
            ..TileGridOptions::default()
        };
        TileCache::new(Arc::new(InstantFetcher), &options)
    }

    #[tokio::test]
    async fn test_duplicate_visible_ids_admitted_once() {
        let mut cache = cache(6);
        let mut surface = MemorySurface::new();
        let report = cache.reconcile(&ids(&["a", "a", "b"]), 10.0, &mut surface);
        assert_eq!(report.admitted, ids(&["a", "b"]));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_admission_order_and_deferral() {
        let mut cache = cache(2);
        let mut surface = MemorySurface::new();
        let report = cache.reconcile(&ids(&["near", "mid", "far"]), 10.0, &mut surface);
        assert_eq!(report.admitted, ids(&["near", "mid"]));
        assert_eq!(report.deferred, 1);
        assert_eq!(cache.state(&TileId::from("far")), Some(TileState::Unloaded));
    }

    #[tokio::test]
    async fn test_below_zoom_gate_admits_nothing() {
        let mut cache = cache(6);
        let mut surface = MemorySurface::new();
        let report = cache.reconcile(&ids(&["a"]), 5.0, &mut surface);
        assert!(report.admitted.is_empty());
        assert_eq!(report.deferred, 1);
    }

    #[tokio::test]
    async fn test_results_register_and_style() {
        let mut cache = cache(6);
        let mut surface = MemorySurface::new();
        let styler = StyleApplier::default();
        cache.reconcile(&ids(&["a", "b"]), 10.0, &mut surface);

        let outcomes = cache
            .await_results(&mut surface, &styler, 2, Duration::from_secs(5))
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, TileOutcome::Loaded(_))));
        assert_eq!(cache.loaded_tiles().count(), 2);
        assert_eq!(
            surface.paint_property("layer-a", "fill-color"),
            Some(styler.expression())
        );

        let stats = cache.stats();
        assert_eq!(stats.loaded, 2);
        assert_eq!(stats.fetches_started, 2);
        assert_eq!(stats.registrations, 2);
    }

    #[tokio::test]
    async fn test_evict_all() {
        let mut cache = cache(6);
        let mut surface = MemorySurface::new();
        let styler = StyleApplier::default();
        cache.reconcile(&ids(&["a", "b"]), 10.0, &mut surface);
        cache
            .await_results(&mut surface, &styler, 2, Duration::from_secs(5))
            .await;

        assert_eq!(cache.evict_all(&mut surface), 2);
        assert!(cache.is_empty());
        assert_eq!(surface.layer_count(), 0);
        assert_eq!(surface.source_count(), 0);
    }
}
