pub mod geojson;
pub mod mvt;
pub mod slicer;
pub mod triangulate;

// Re-exports for convenience
pub use geojson::{GeoJson, GeoJsonFeature, GeoJsonGeometry};
pub use mvt::VectorTile;
pub use slicer::GeoJsonTileIndex;
