//! Shared trait abstractions

use crate::core::geo::GeoBounds;

/// Components fed by the host engine's `move` / `moveend` events
pub trait ViewportAware {
    /// Handle a (possibly intermediate) viewport change
    fn on_viewport_changed(&mut self, bounds: GeoBounds, zoom: f64);

    /// Handle the end of a pan or zoom gesture
    fn on_move_end(&mut self, bounds: GeoBounds, zoom: f64) {
        self.on_viewport_changed(bounds, zoom);
    }
}
