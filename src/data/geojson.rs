use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// GeoJSON geometry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point {
        coordinates: [f64; 2],
    },
    LineString {
        coordinates: Vec<[f64; 2]>,
    },
    Polygon {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPoint {
        coordinates: Vec<[f64; 2]>,
    },
    MultiLineString {
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

impl GeoJsonFeature {
    /// Reads a property as a number.
    ///
    /// Numeric strings are accepted (`"1250"`), anything else yields `None`.
    pub fn numeric_property(&self, name: &str) -> Option<f64> {
        let value = self.properties.as_ref()?.get(name)?;
        let number = match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        number.filter(|v| v.is_finite())
    }
}

/// Root GeoJSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Feature(GeoJsonFeature),
    FeatureCollection { features: Vec<GeoJsonFeature> },
    Geometry(GeoJsonGeometry),
}

/// Min/max of one numeric property across a set of features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropertyRange {
    pub min: f64,
    pub max: f64,
}

impl PropertyRange {
    /// Widens this range to also cover `other`
    pub fn merge(self, other: PropertyRange) -> PropertyRange {
        PropertyRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl GeoJson {
    /// Parses a tile payload
    pub fn from_slice(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// An empty feature collection
    pub fn empty() -> Self {
        GeoJson::FeatureCollection {
            features: Vec::new(),
        }
    }

    /// Gets all features; bare geometries carry none
    pub fn features(&self) -> &[GeoJsonFeature] {
        match self {
            GeoJson::Feature(feature) => std::slice::from_ref(feature),
            GeoJson::FeatureCollection { features } => features,
            GeoJson::Geometry(_) => &[],
        }
    }

    /// Range of a numeric property, or `None` when no feature carries it
    pub fn property_range(&self, name: &str) -> Option<PropertyRange> {
        self.features()
            .iter()
            .filter_map(|f| f.numeric_property(name))
            .fold(None, |acc: Option<PropertyRange>, v| {
                let point = PropertyRange { min: v, max: v };
                Some(match acc {
                    Some(range) => range.merge(point),
                    None => point,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: &str = r#"
    {
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"kids_250k": 1320, "kids_500k": "610"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-97.8, 30.2], [-97.7, 30.2], [-97.7, 30.3], [-97.8, 30.2]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"kids_250k": 480, "kids_500k": null},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-97.7, 30.2], [-97.6, 30.2], [-97.6, 30.3], [-97.7, 30.2]]]
                }
            }
        ]
    }
    "#;

    #[test]
    fn test_geojson_parsing() {
        let data = GeoJson::from_slice(TILE.as_bytes()).unwrap();
        assert_eq!(data.features().len(), 2);
    }

    #[test]
    fn test_numeric_property_coercion() {
        let data = GeoJson::from_slice(TILE.as_bytes()).unwrap();
        let first = &data.features()[0];
        let second = &data.features()[1];

        assert_eq!(first.numeric_property("kids_250k"), Some(1320.0));
        assert_eq!(first.numeric_property("kids_500k"), Some(610.0));
        assert_eq!(second.numeric_property("kids_500k"), None);
        assert_eq!(second.numeric_property("missing"), None);
    }

    #[test]
    fn test_property_range() {
        let data = GeoJson::from_slice(TILE.as_bytes()).unwrap();
        let range = data.property_range("kids_250k").unwrap();
        assert_eq!(range.min, 480.0);
        assert_eq!(range.max, 1320.0);
        assert!(data.property_range("missing").is_none());
        assert!(GeoJson::empty().property_range("kids_250k").is_none());
    }

    #[test]
    fn test_invalid_payload_is_error() {
        assert!(GeoJson::from_slice(b"<html>not found</html>").is_err());
    }
}
