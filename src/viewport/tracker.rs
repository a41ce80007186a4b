//! Trailing-edge debounce of host viewport events
//!
//! The host may report bounds every frame while the user pans. Only the last
//! view observed before a quiet period of `debounce` settles into a visible
//! tile set; everything before it is overwritten. A `moveend` settles the
//! pending view immediately.

use crate::core::config::{TileGridOptions, VisibleTilePolicy};
use crate::core::geo::GeoBounds;
use crate::grid::index::GridIndex;
use crate::prelude::{Duration, Instant};
use crate::tiles::types::TileId;
use crate::traits::ViewportAware;
use std::cmp::Ordering;

/// A viewport that has stopped moving, with its ordered visible tiles
#[derive(Debug, Clone, PartialEq)]
pub struct SettledView {
    pub bounds: GeoBounds,
    pub zoom: f64,
    /// Nearest-to-center first
    pub visible: Vec<TileId>,
}

#[derive(Debug, Clone, Copy)]
struct PendingView {
    bounds: GeoBounds,
    zoom: f64,
    changed_at: Instant,
    flush: bool,
}

#[derive(Debug)]
pub struct ViewportTracker {
    policy: VisibleTilePolicy,
    debounce: Duration,
    pending: Option<PendingView>,
    last_settled: Option<SettledView>,
}

impl ViewportTracker {
    pub fn new(policy: VisibleTilePolicy, debounce: Duration) -> Self {
        Self {
            policy,
            debounce,
            pending: None,
            last_settled: None,
        }
    }

    pub fn from_options(options: &TileGridOptions) -> Self {
        Self::new(options.visible_tiles, options.debounce())
    }

    pub fn policy(&self) -> &VisibleTilePolicy {
        &self.policy
    }

    pub fn on_viewport_change(&mut self, bounds: GeoBounds, zoom: f64) {
        self.on_viewport_change_at(bounds, zoom, Instant::now());
    }

    /// Records a view and restarts the quiescence window.
    ///
    /// A move after an unpolled move-end starts a new gesture, so it waits out
    /// the window like any other move.
    pub fn on_viewport_change_at(&mut self, bounds: GeoBounds, zoom: f64, now: Instant) {
        self.pending = Some(PendingView {
            bounds,
            zoom,
            changed_at: now,
            flush: false,
        });
    }

    /// Records a view that settles on the next poll regardless of debounce
    pub fn on_move_end_at(&mut self, bounds: GeoBounds, zoom: f64, now: Instant) {
        self.pending = Some(PendingView {
            bounds,
            zoom,
            changed_at: now,
            flush: true,
        });
    }

    /// Makes the pending view, if any, settle on the next poll.
    ///
    /// Returns whether a view was pending.
    pub fn flush_pending(&mut self) -> bool {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.flush = true;
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending view will settle, if one is waiting
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|p| {
            if p.flush {
                p.changed_at
            } else {
                p.changed_at + self.debounce
            }
        })
    }

    pub fn last_settled(&self) -> Option<&SettledView> {
        self.last_settled.as_ref()
    }

    /// Settles the pending view once its quiescence window has elapsed.
    ///
    /// Without a grid (metadata not loaded yet) the visible set is empty.
    pub fn poll(&mut self, grid: Option<&GridIndex>, now: Instant) -> Option<SettledView> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        let pending = self.pending.take()?;

        let visible = match grid {
            Some(grid) => visible_tiles(grid, &pending.bounds, pending.zoom, &self.policy),
            None => Vec::new(),
        };
        log::debug!(
            "viewport settled at zoom {:.2} with {} visible tiles",
            pending.zoom,
            visible.len()
        );

        let settled = SettledView {
            bounds: pending.bounds,
            zoom: pending.zoom,
            visible,
        };
        self.last_settled = Some(settled.clone());
        Some(settled)
    }
}

impl ViewportAware for ViewportTracker {
    fn on_viewport_changed(&mut self, bounds: GeoBounds, zoom: f64) {
        self.on_viewport_change(bounds, zoom);
    }

    fn on_move_end(&mut self, bounds: GeoBounds, zoom: f64) {
        self.on_move_end_at(bounds, zoom, Instant::now());
    }
}

/// Tiles intersecting `bounds`, ordered by distance from the viewport center
/// to each tile center. Empty below the policy's zoom gate.
pub fn visible_tiles(
    grid: &GridIndex,
    bounds: &GeoBounds,
    zoom: f64,
    policy: &VisibleTilePolicy,
) -> Vec<TileId> {
    if !policy.admits(zoom) {
        return Vec::new();
    }

    let center = bounds.center();
    let mut tiles: Vec<(f64, &TileId)> = grid
        .intersecting(bounds)
        .into_iter()
        .map(|tile| (center.planar_distance_to(&tile.bbox.center()), &tile.id))
        .collect();
    tiles.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(b.1))
    });
    tiles.into_iter().map(|(_, id)| id.clone()).collect()
}
