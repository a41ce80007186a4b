use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate with latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lng >= -180.0 && self.lng <= 180.0
    }

    /// Euclidean distance in degree space.
    ///
    /// Tile prioritisation only needs a consistent ordering, so no projection
    /// or great-circle correction is applied.
    pub fn planar_distance_to(&self, other: &LatLng) -> f64 {
        let dlat = self.lat - other.lat;
        let dlng = self.lng - other.lng;
        (dlat * dlat + dlng * dlng).sqrt()
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// The geographic box currently displayed by the host map engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl GeoBounds {
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Self {
        Self {
            west,
            east,
            south,
            north,
        }
    }

    /// Builds bounds from a south-west and a north-east corner
    pub fn from_corners(south_west: LatLng, north_east: LatLng) -> Self {
        Self::new(south_west.lng, north_east.lng, south_west.lat, north_east.lat)
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    /// Checks if the bounds are valid (west <= east, south <= north, no NaN)
    pub fn is_valid(&self) -> bool {
        self.west <= self.east && self.south <= self.north
    }

    /// Closed-interval overlap test: touching edges count as intersecting.
    pub fn intersects(&self, tile: &TileBBox) -> bool {
        self.west <= tile.max_lon
            && self.east >= tile.min_lon
            && self.south <= tile.max_lat
            && self.north >= tile.min_lat
    }
}

/// Bounding box of a grid tile as published in the metadata document
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl TileBBox {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub fn is_valid(&self) -> bool {
        self.min_lon <= self.max_lon && self.min_lat <= self.max_lat
    }

    /// Converts the box into the viewport-style representation
    pub fn as_bounds(&self) -> GeoBounds {
        GeoBounds::new(self.min_lon, self.max_lon, self.min_lat, self.max_lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_creation() {
        let coord = LatLng::new(30.2672, -97.7431);
        assert_eq!(coord.lat, 30.2672);
        assert_eq!(coord.lng, -97.7431);
        assert!(coord.is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
    }

    #[test]
    fn test_planar_distance() {
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(3.0, 4.0);
        assert_eq!(a.planar_distance_to(&b), 5.0);
    }

    #[test]
    fn test_bounds_center() {
        let bounds = GeoBounds::new(-98.0, -97.0, 30.0, 31.0);
        assert_eq!(bounds.center(), LatLng::new(30.5, -97.5));
        assert!(bounds.is_valid());
        assert!(!GeoBounds::new(1.0, 0.0, 0.0, 1.0).is_valid());
    }

    #[test]
    fn test_intersection_overlap_and_disjoint() {
        let view = GeoBounds::new(-98.0, -97.0, 30.0, 31.0);
        let inside = TileBBox::new(-97.8, -97.2, 30.2, 30.8);
        let partial = TileBBox::new(-97.5, -96.5, 30.5, 31.5);
        let disjoint = TileBBox::new(-96.0, -95.0, 30.0, 31.0);

        assert!(view.intersects(&inside));
        assert!(view.intersects(&partial));
        assert!(!view.intersects(&disjoint));
    }

    #[test]
    fn test_intersection_edge_touching_counts() {
        let view = GeoBounds::new(-98.0, -97.0, 30.0, 31.0);
        let east_edge = TileBBox::new(-97.0, -96.0, 30.0, 31.0);
        let north_corner = TileBBox::new(-97.0, -96.0, 31.0, 32.0);
        let just_past = TileBBox::new(-96.999_999, -96.0, 30.0, 31.0);

        assert!(view.intersects(&east_edge));
        assert!(view.intersects(&north_corner));
        assert!(!view.intersects(&just_past));
    }

    #[test]
    fn test_tile_bbox_center() {
        let tile = TileBBox::new(-98.0, -96.0, 30.0, 32.0);
        assert_eq!(tile.center(), LatLng::new(31.0, -97.0));
        assert_eq!(tile.as_bounds().center(), tile.center());
    }
}
