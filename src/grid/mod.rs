//! Static tile grid loaded from the metadata document

pub mod index;
pub mod metadata;

pub use index::{GridIndex, GridTile};
pub use metadata::{GridEntry, GridMetadata};
