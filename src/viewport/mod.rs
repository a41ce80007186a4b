//! Viewport debouncing and visible-set computation

pub mod tracker;

pub use tracker::{visible_tiles, SettledView, ViewportTracker};
