//! Bracket filters and the fill styling derived from them

pub mod applier;
pub mod color;
pub mod filter;

pub use applier::{PaintCase, PaintRule, StyleApplier};
pub use color::Color;
pub use filter::{Bracket, FilterConfig, FilterWarning, Tier};
