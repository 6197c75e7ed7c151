//! Engine-wide constants for the tile pyramid and the Mercator plane.

/// Pixel size of one tile in the view math.
pub const TILE_SIZE: u32 = 256;

/// Lowest camera zoom.
pub const MIN_ZOOM: f64 = 0.0;

/// Highest camera zoom and deepest valid tile level.
pub const MAX_ZOOM: u8 = 22;

/// Rings of tiles loaded around the visible rectangle.
pub const TILE_BUFFER: u32 = 1;

/// Longitude extent of the world.
pub const MAX_LONGITUDE: f64 = 180.0;

/// Latitude limit of the projection; the poles are unreachable in Web Mercator.
pub const MAX_LATITUDE: f64 = 85.05;

/// Default tile size declared by vector layers.
pub const DEFAULT_VECTOR_TILE_SIZE: u32 = 512;

/// Default tile size declared by image layers.
pub const DEFAULT_IMAGE_TILE_SIZE: u32 = 256;

/// Zoom levels pre-sliced eagerly by GeoJSON layers.
pub const GEOJSON_INDEX_MAX_ZOOM: u8 = 5;

/// Named vector sub-layers drawn by default, with RGBA colours.
pub const DEFAULT_SUB_LAYERS: [(&str, [u8; 4]); 4] = [
    ("water", [180, 240, 250, 255]),
    ("landcover", [202, 246, 193, 255]),
    ("park", [202, 255, 193, 255]),
    ("building", [185, 175, 139, 191]),
];

/// Outline colour of the debug tile overlay.
pub const DEBUG_OUTLINE_COLOR: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
