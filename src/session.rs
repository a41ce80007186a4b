//! One heatmap overlay on one host map
//!
//! `HeatmapSession` owns the grid, the viewport tracker, the tile cache, the
//! style applier and the render surface, and drives them from a single
//! cooperative loop. Hosts either call [`HeatmapSession::tick`] from their own
//! frame loop or hand the session to [`HeatmapSession::run`] with a channel of
//! [`MapEvent`]s.

use crate::core::config::TileGridOptions;
use crate::core::geo::GeoBounds;
use crate::grid::index::GridIndex;
use crate::prelude::{Arc, Instant};
use crate::render::RenderAdapter;
use crate::runtime::async_utils::async_delay;
use crate::style::applier::StyleApplier;
use crate::style::filter::FilterConfig;
use crate::tiles::cache::{ReconcileReport, TileCache, TileOutcome};
use crate::tiles::loader::{HttpTileFetcher, TileFetcher};
use crate::tiles::source::StaticTileSource;
use crate::tiles::types::TileId;
use crate::traits::ViewportAware;
use crate::viewport::tracker::ViewportTracker;
use crate::Result;
use crossbeam_channel::{Receiver, TryRecvError};

/// Notifications forwarded from the host map and UI
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Move { bounds: GeoBounds, zoom: f64 },
    MoveEnd { bounds: GeoBounds, zoom: f64 },
    Filter(FilterConfig),
    /// Retry a failed metadata load
    ReloadMetadata,
    Shutdown,
}

/// What one tick did
#[derive(Debug, Default)]
pub struct TickReport {
    pub outcomes: Vec<TileOutcome>,
    pub reconcile: Option<ReconcileReport>,
}

pub struct HeatmapSession<S: RenderAdapter> {
    options: TileGridOptions,
    fetcher: Arc<dyn TileFetcher>,
    grid: Option<GridIndex>,
    tracker: ViewportTracker,
    cache: TileCache,
    styler: StyleApplier,
    surface: S,
    last_visible: Vec<TileId>,
    last_zoom: f64,
    last_reconcile: Option<Instant>,
    /// Visible tiles were held back by the caps on the last reconcile
    backlog: bool,
}

impl<S: RenderAdapter> HeatmapSession<S> {
    pub fn new(options: TileGridOptions, fetcher: Arc<dyn TileFetcher>, surface: S) -> Self {
        Self {
            tracker: ViewportTracker::from_options(&options),
            cache: TileCache::new(Arc::clone(&fetcher), &options),
            styler: StyleApplier::default(),
            grid: None,
            fetcher,
            surface,
            options,
            last_visible: Vec::new(),
            last_zoom: 0.0,
            last_reconcile: None,
            backlog: false,
        }
    }

    /// Session fetching from `options.base_url` over HTTP
    pub fn with_http(options: TileGridOptions, surface: S) -> Self {
        let source = Arc::new(StaticTileSource::new(options.base_url.clone()));
        let fetcher = Arc::new(HttpTileFetcher::new(source, options.request_timeout()));
        Self::new(options, fetcher, surface)
    }

    /// Loads the grid index; may be called again after a failure.
    ///
    /// Until it succeeds every settled view has an empty visible set.
    pub async fn load_metadata(&mut self) -> Result<usize> {
        match GridIndex::load(self.fetcher.as_ref()).await {
            Ok(grid) => {
                let count = grid.len();
                self.grid = Some(grid);
                // Settle whatever the user is looking at now: a newer pending
                // view wins over the last settled one
                if !self.tracker.flush_pending() {
                    if let Some(view) = self.tracker.last_settled().cloned() {
                        self.tracker
                            .on_move_end_at(view.bounds, view.zoom, Instant::now());
                    }
                }
                Ok(count)
            }
            Err(e) => {
                log::error!("{}; no tiles will be shown until metadata loads", e);
                Err(e)
            }
        }
    }

    pub fn on_viewport_change(&mut self, bounds: GeoBounds, zoom: f64) {
        self.tracker.on_viewport_change(bounds, zoom);
    }

    /// Settles the view immediately and ticks
    pub fn on_move_end(&mut self, bounds: GeoBounds, zoom: f64) -> TickReport {
        let now = Instant::now();
        self.tracker.on_move_end_at(bounds, zoom, now);
        self.tick_at(now)
    }

    /// Restyles every loaded tile; never fetches or evicts
    pub fn set_filter(&mut self, filter: FilterConfig) -> usize {
        self.styler
            .reapply_all(filter, self.cache.loaded_tiles(), &mut self.surface)
    }

    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// Handles fetch completions, then reconciles if the view settled, if
    /// completions freed capacity for held-back tiles, or if loads have been
    /// pending for a full forced-reconcile interval.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let outcomes = self.cache.poll_results(&mut self.surface, &self.styler);

        let reconcile = if let Some(view) = self.tracker.poll(self.grid.as_ref(), now) {
            self.last_visible = view.visible;
            self.last_zoom = view.zoom;
            Some(self.reconcile_now(now))
        } else if self.backlog && !outcomes.is_empty() {
            Some(self.reconcile_now(now))
        } else if self.cache.has_loading() && self.force_due(now) {
            log::debug!("forcing reconcile with {} tiles loading", self.cache.loading_count());
            Some(self.reconcile_now(now))
        } else {
            None
        };

        TickReport {
            outcomes,
            reconcile,
        }
    }

    fn force_due(&self, now: Instant) -> bool {
        match self.last_reconcile {
            Some(last) => {
                now.saturating_duration_since(last) >= self.options.force_reconcile_interval()
            }
            None => true,
        }
    }

    fn reconcile_now(&mut self, now: Instant) -> ReconcileReport {
        self.last_reconcile = Some(now);
        let report =
            self.cache
                .reconcile_at(&self.last_visible, self.last_zoom, &mut self.surface, now);
        self.backlog = report.deferred > 0;
        report
    }

    /// Drives the session from `events` until `Shutdown` or until every
    /// sender is dropped, then hands the session back.
    pub async fn run(mut self, events: Receiver<MapEvent>) -> Self {
        log::debug!("session loop starting");
        loop {
            loop {
                match events.try_recv() {
                    Ok(MapEvent::Move { bounds, zoom }) => self.on_viewport_change(bounds, zoom),
                    Ok(MapEvent::MoveEnd { bounds, zoom }) => {
                        self.tracker.on_move_end_at(bounds, zoom, Instant::now())
                    }
                    Ok(MapEvent::Filter(filter)) => {
                        self.set_filter(filter);
                    }
                    Ok(MapEvent::ReloadMetadata) => {
                        // Failure is already logged; the next event may retry
                        let _ = self.load_metadata().await;
                    }
                    Ok(MapEvent::Shutdown) | Err(TryRecvError::Disconnected) => {
                        log::debug!("session loop exiting");
                        return self;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            self.tick();
            async_delay(self.options.tick_interval()).await;
        }
    }

    /// Unregisters every tile and aborts outstanding fetches
    pub fn clear(&mut self) -> usize {
        self.last_visible.clear();
        self.backlog = false;
        self.cache.evict_all(&mut self.surface)
    }

    pub fn options(&self) -> &TileGridOptions {
        &self.options
    }

    pub fn grid(&self) -> Option<&GridIndex> {
        self.grid.as_ref()
    }

    pub fn tracker(&self) -> &ViewportTracker {
        &self.tracker
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn styler(&self) -> &StyleApplier {
        &self.styler
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Tiles of the last settled view, closest first
    pub fn visible(&self) -> &[TileId] {
        &self.last_visible
    }
}

impl<S: RenderAdapter> ViewportAware for HeatmapSession<S> {
    fn on_viewport_changed(&mut self, bounds: GeoBounds, zoom: f64) {
        self.on_viewport_change(bounds, zoom);
    }

    fn on_move_end(&mut self, bounds: GeoBounds, zoom: f64) {
        HeatmapSession::on_move_end(self, bounds, zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileBBox;
    use crate::data::geojson::GeoJson;
    use crate::grid::metadata::{GridEntry, GridMetadata};
    use crate::prelude::Duration;
    use crate::render::memory::MemorySurface;
    use crate::tiles::types::TileState;
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Two side-by-side tiles; metadata can be made to fail
    struct TwoTiles {
        metadata_fails: AtomicBool,
    }

    #[async_trait]
    impl TileFetcher for TwoTiles {
        async fn fetch_metadata(&self) -> Result<GridMetadata> {
            if self.metadata_fails.load(Ordering::SeqCst) {
                return Err(Error::MetadataLoad {
                    reason: "HTTP 503".into(),
                });
            }
            let mut grids = std::collections::HashMap::new();
            grids.insert(
                TileId::from("west"),
                GridEntry {
                    bounds: TileBBox::new(-98.0, -97.5, 30.0, 30.5),
                    feature_count: None,
                },
            );
            grids.insert(
                TileId::from("east"),
                GridEntry {
                    bounds: TileBBox::new(-97.5, -97.0, 30.0, 30.5),
                    feature_count: None,
                },
            );
            Ok(GridMetadata { grids })
        }

        async fn fetch_tile(&self, _id: &TileId) -> Result<GeoJson> {
            Ok(GeoJson::empty())
        }
    }

    fn session(metadata_fails: bool) -> HeatmapSession<MemorySurface> {
        let fetcher = Arc::new(TwoTiles {
            metadata_fails: AtomicBool::new(metadata_fails),
        });
        HeatmapSession::new(TileGridOptions::default(), fetcher, MemorySurface::new())
    }

    async fn settle(session: &mut HeatmapSession<MemorySurface>) {
        for _ in 0..200 {
            session.tick();
            if !session.cache().has_loading() {
                return;
            }
            async_delay(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_move_end_loads_visible_tiles() {
        let mut session = session(false);
        assert_eq!(session.load_metadata().await.unwrap(), 2);

        let report = session.on_move_end(GeoBounds::new(-97.9, -97.6, 30.1, 30.4), 10.0);
        let reconcile = report.reconcile.unwrap();
        assert_eq!(reconcile.admitted, vec![TileId::from("west")]);

        settle(&mut session).await;
        assert_eq!(
            session.cache().state(&TileId::from("west")),
            Some(TileState::Loaded)
        );
        assert!(session.surface().has_layer("layer-west"));
        assert!(!session.cache().contains(&TileId::from("east")));
    }

    #[tokio::test]
    async fn test_metadata_failure_then_retry() {
        let fetcher = Arc::new(TwoTiles {
            metadata_fails: AtomicBool::new(true),
        });
        let mut session = HeatmapSession::new(
            TileGridOptions::default(),
            fetcher.clone(),
            MemorySurface::new(),
        );
        let bounds = GeoBounds::new(-98.0, -97.0, 30.0, 30.5);

        assert!(matches!(
            session.load_metadata().await,
            Err(Error::MetadataLoad { .. })
        ));
        let report = session.on_move_end(bounds, 10.0);
        assert!(report.reconcile.unwrap().admitted.is_empty());

        fetcher.metadata_fails.store(false, Ordering::SeqCst);
        session.load_metadata().await.unwrap();
        let report = session.tick();
        assert_eq!(report.reconcile.unwrap().admitted.len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_load_settles_newest_view() {
        let fetcher = Arc::new(TwoTiles {
            metadata_fails: AtomicBool::new(true),
        });
        let mut session = HeatmapSession::new(
            TileGridOptions::default(),
            fetcher.clone(),
            MemorySurface::new(),
        );
        let west = GeoBounds::new(-97.9, -97.6, 30.1, 30.4);
        let east = GeoBounds::new(-97.4, -97.1, 30.1, 30.4);

        assert!(session.load_metadata().await.is_err());
        session.on_move_end(west, 10.0);
        // The user pans on before metadata arrives
        session.on_viewport_change(east, 10.0);

        fetcher.metadata_fails.store(false, Ordering::SeqCst);
        session.load_metadata().await.unwrap();
        let reconcile = session.tick().reconcile.unwrap();
        assert_eq!(reconcile.admitted, vec![TileId::from("east")]);
        assert_eq!(session.visible(), &[TileId::from("east")]);
        assert_eq!(session.tracker().last_settled().unwrap().bounds, east);
    }

    #[tokio::test]
    async fn test_filter_change_restyles_without_fetching() {
        let mut session = session(false);
        session.load_metadata().await.unwrap();
        session.on_move_end(GeoBounds::new(-98.0, -97.0, 30.0, 30.5), 10.0);
        settle(&mut session).await;
        let fetches = session.cache().stats().fetches_started;

        let restyled = session.set_filter(FilterConfig::empty());
        assert_eq!(restyled, 2);
        assert_eq!(session.cache().stats().fetches_started, fetches);
        assert_eq!(
            session.surface().paint_property("layer-east", "fill-color"),
            Some(&serde_json::json!(["literal", crate::core::constants::TRANSPARENT]))
        );
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let mut session = session(false);
        session.load_metadata().await.unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(MapEvent::MoveEnd {
            bounds: GeoBounds::new(-98.0, -97.0, 30.0, 30.5),
            zoom: 10.0,
        })
        .unwrap();

        let driver = async move {
            // Give the loop time to admit and register both tiles
            async_delay(Duration::from_millis(200)).await;
            tx.send(MapEvent::Shutdown).unwrap();
        };
        let (session, ()) = futures::join!(session.run(rx), driver);

        let layers = session.surface().layer_ids();
        assert!(layers.contains(&"layer-west"));
        assert!(layers.contains(&"layer-east"));
    }
}
