use crate::{MapError, Result};
use geo_types::{Coord, LineString, Polygon};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// A `[lng, lat]` position. Extra ordinates such as altitude are accepted and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position(pub [f64; 2]);

impl Position {
    pub fn lng(&self) -> f64 {
        self.0[0]
    }

    pub fn lat(&self) -> f64 {
        self.0[1]
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let values = Vec::<f64>::deserialize(deserializer)?;
        if values.len() < 2 {
            return Err(de::Error::invalid_length(values.len(), &"at least two ordinates"));
        }
        Ok(Position([values[0], values[1]]))
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// GeoJSON geometry types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Point {
        coordinates: Position,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<GeoJsonGeometry>,
    },
}

impl GeoJsonGeometry {
    /// Every areal part of the geometry in lng/lat. Points and lines have no fill
    /// and contribute nothing.
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        let mut out = Vec::new();
        self.collect_polygons(&mut out);
        out
    }

    fn collect_polygons(&self, out: &mut Vec<Polygon<f64>>) {
        match self {
            GeoJsonGeometry::Polygon { coordinates } => out.extend(to_polygon(coordinates)),
            GeoJsonGeometry::MultiPolygon { coordinates } => {
                out.extend(coordinates.iter().filter_map(|rings| to_polygon(rings)))
            }
            GeoJsonGeometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.collect_polygons(out);
                }
            }
            _ => {}
        }
    }
}

fn to_line_string(ring: &[Position]) -> LineString<f64> {
    LineString::from(
        ring.iter()
            .map(|p| Coord { x: p.lng(), y: p.lat() })
            .collect::<Vec<_>>(),
    )
}

fn to_polygon(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    Some(Polygon::new(
        to_line_string(exterior),
        interiors.iter().map(|r| to_line_string(r)).collect(),
    ))
}

/// GeoJSON feature with geometry and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoJsonFeature {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub geometry: Option<GeoJsonGeometry>,
    #[serde(default)]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

/// Root GeoJSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    Feature(GeoJsonFeature),
    FeatureCollection { features: Vec<GeoJsonFeature> },
}

impl GeoJson {
    /// Parses a document. A bare geometry is wrapped into a single feature.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<GeoJson>(bytes) {
            Ok(doc) => Ok(doc),
            Err(doc_err) => match serde_json::from_slice::<GeoJsonGeometry>(bytes) {
                Ok(geometry) => Ok(GeoJson::from(geometry)),
                Err(_) => Err(MapError::Serialization(doc_err)),
            },
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        Self::from_slice(s.as_bytes())
    }

    pub fn features(&self) -> &[GeoJsonFeature] {
        match self {
            GeoJson::Feature(feature) => std::slice::from_ref(feature),
            GeoJson::FeatureCollection { features } => features,
        }
    }

    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        self.features()
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| g.polygons())
            .collect()
    }
}

impl From<GeoJsonGeometry> for GeoJson {
    fn from(geometry: GeoJsonGeometry) -> Self {
        GeoJson::Feature(GeoJsonFeature {
            id: None,
            geometry: Some(geometry),
            properties: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "block" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
                        [[4, 4], [4, 6], [6, 6], [6, 4], [4, 4]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1, 30]] }
            },
            {
                "type": "Feature",
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[20, 20], [21, 20], [21, 21], [20, 20]]],
                        [[[30, 30], [31, 30], [31, 31], [30, 30]]]
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let doc = GeoJson::from_str(COLLECTION).unwrap();
        assert_eq!(doc.features().len(), 3);
        let polygons = doc.polygons();
        assert_eq!(polygons.len(), 3);
        assert_eq!(polygons[0].interiors().len(), 1);
    }

    #[test]
    fn test_altitude_is_dropped() {
        let doc = GeoJson::from_str(COLLECTION).unwrap();
        match &doc.features()[1].geometry {
            Some(GeoJsonGeometry::LineString { coordinates }) => {
                assert_eq!(coordinates[1], Position([1.0, 1.0]));
            }
            other => panic!("unexpected geometry {other:?}"),
        }
    }

    #[test]
    fn test_bare_geometry() {
        let doc = GeoJson::from_str(r#"{"type":"Point","coordinates":[1,2]}"#).unwrap();
        assert_eq!(doc.features().len(), 1);
        assert!(doc.polygons().is_empty());
    }

    #[test]
    fn test_invalid_document() {
        assert!(matches!(
            GeoJson::from_str("{\"type\":\"Nope\"}"),
            Err(MapError::Serialization(_))
        ));
        let short = r#"{"type":"Point","coordinates":[1]}"#;
        assert!(GeoJson::from_str(short).is_err());
    }
}
