//! Map layers.
//!
//! Layers are a closed set of variants behind [`Layer`]. Each one owns a
//! per-tile cache and knows how to fill it (`ensure_tiles`) and draw from it
//! (`draw_tile`); the map and the compositor dispatch through the enum.

pub mod geojson;
pub mod image;
mod remote;
pub mod vector;

use crate::{
    core::constants::{DEFAULT_IMAGE_TILE_SIZE, DEFAULT_SUB_LAYERS, DEFAULT_VECTOR_TILE_SIZE, MAX_ZOOM},
    data::geojson::GeoJson,
    rendering::surface::RenderSurface,
    tiles::{cache::TileState, id::TileId, visibility::VisibleTiles, worker::{TileJobResult, TileWorkerPool}},
    MapError, Result,
};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

pub use self::{geojson::GeoJsonLayer, image::ImageLayer, vector::VectorLayer};
pub use self::{image::ImageTile, vector::SubLayerVertices};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Vector,
    Image,
    GeoJson,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Vector => write!(f, "vector"),
            LayerKind::Image => write!(f, "image"),
            LayerKind::GeoJson => write!(f, "geojson"),
        }
    }
}

impl FromStr for LayerKind {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vector" => Ok(LayerKind::Vector),
            "image" => Ok(LayerKind::Image),
            "geojson" => Ok(LayerKind::GeoJson),
            other => Err(MapError::Layer(format!("unknown layer type '{other}'"))),
        }
    }
}

/// Solid fill style of a GeoJSON layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStyle {
    color: String,
    opacity: f32,
    #[serde(skip)]
    rgb: [u8; 3],
}

impl LayerStyle {
    pub fn new(color: &str, opacity: f32) -> Result<Self> {
        let rgb = parse_hex_color(color)?;
        validate_opacity(opacity)?;
        Ok(Self {
            color: color.to_string(),
            opacity,
            rgb,
        })
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Replaces the colour; a malformed value leaves the style untouched.
    pub fn set_color(&mut self, color: &str) -> Result<()> {
        self.rgb = parse_hex_color(color)?;
        self.color = color.to_string();
        Ok(())
    }

    /// Replaces the opacity; values outside `[0, 1]` leave the style untouched.
    pub fn set_opacity(&mut self, opacity: f32) -> Result<()> {
        validate_opacity(opacity)?;
        self.opacity = opacity;
        Ok(())
    }

    pub fn rgba(&self) -> [f32; 4] {
        [
            self.rgb[0] as f32 / 255.0,
            self.rgb[1] as f32 / 255.0,
            self.rgb[2] as f32 / 255.0,
            self.opacity,
        ]
    }
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self {
            color: "#ff0000".to_string(),
            opacity: 0.5,
            rgb: [255, 0, 0],
        }
    }
}

fn parse_hex_color(color: &str) -> Result<[u8; 3]> {
    let invalid = || MapError::Validation(format!("color must be #RRGGBB, got '{color}'"));
    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

fn validate_opacity(opacity: f32) -> Result<()> {
    if (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(MapError::Validation(format!(
            "opacity must be within [0, 1], got {opacity}"
        )))
    }
}

/// Style fields as they appear in a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleDescriptor {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub opacity: Option<f32>,
}

/// A named vector sub-layer and its fill colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubLayerStyle {
    pub name: String,
    pub color: [u8; 4],
}

impl SubLayerStyle {
    pub fn new(name: impl Into<String>, color: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    pub fn defaults() -> Vec<SubLayerStyle> {
        DEFAULT_SUB_LAYERS
            .iter()
            .map(|(name, color)| SubLayerStyle::new(*name, *color))
            .collect()
    }

    pub fn rgba(&self) -> [f32; 4] {
        self.color.map(|c| c as f32 / 255.0)
    }
}

/// Where a GeoJSON layer gets its features from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeoJsonSource {
    Url(String),
    Inline(GeoJson),
}

/// Everything `add_layer` accepts, in the same shape as the JSON form:
///
/// ```json
/// { "id": "roads", "type": "vector", "url": "https://host/{z}/{x}/{y}.pbf", "maxZoom": 14 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<GeoJsonSource>,
    #[serde(default)]
    pub tile_size: Option<u32>,
    #[serde(default)]
    pub min_zoom: Option<f64>,
    #[serde(default)]
    pub max_zoom: Option<f64>,
    #[serde(default)]
    pub style: Option<StyleDescriptor>,
    #[serde(default)]
    pub sub_layers: Option<Vec<SubLayerStyle>>,
}

impl LayerDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            url: None,
            data: None,
            tile_size: None,
            min_zoom: None,
            max_zoom: None,
            style: None,
            sub_layers: None,
        }
    }

    pub fn vector(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(id, "vector").with_url(url)
    }

    pub fn image(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(id, "image").with_url(url)
    }

    pub fn geojson(id: impl Into<String>, data: GeoJsonSource) -> Self {
        Self {
            data: Some(data),
            ..Self::new(id, "geojson")
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: f64, max_zoom: f64) -> Self {
        self.min_zoom = Some(min_zoom);
        self.max_zoom = Some(max_zoom);
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = Some(tile_size);
        self
    }

    pub fn with_style(mut self, color: Option<&str>, opacity: Option<f32>) -> Self {
        self.style = Some(StyleDescriptor {
            color: color.map(str::to_string),
            opacity,
        });
        self
    }

    pub fn with_sub_layers(mut self, sub_layers: Vec<SubLayerStyle>) -> Self {
        self.sub_layers = Some(sub_layers);
        self
    }

    /// Effective `(min_zoom, max_zoom)`. Out-of-range values fall back to `0` and `22`.
    pub fn zoom_range(&self) -> (f64, f64) {
        let min_zoom = self
            .min_zoom
            .filter(|z| (0.0..MAX_ZOOM as f64).contains(z))
            .unwrap_or(0.0);
        let max_zoom = self
            .max_zoom
            .filter(|z| *z > min_zoom && *z < (MAX_ZOOM + 1) as f64)
            .unwrap_or(MAX_ZOOM as f64);
        (min_zoom, max_zoom)
    }

    fn require_url(&self) -> Result<String> {
        self.url
            .clone()
            .ok_or_else(|| MapError::Layer(format!("{} layer '{}' needs a url", self.kind, self.id)))
    }
}

/// Identity and zoom range shared by every layer kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerProperties {
    pub id: String,
    /// Unique per constructed layer, so jobs of a removed layer never reach a
    /// later layer reusing its id.
    pub instance: u64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub tile_size: u32,
}

impl LayerProperties {
    fn from_descriptor(desc: &LayerDescriptor, default_tile_size: u32) -> Self {
        static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);
        let (min_zoom, max_zoom) = desc.zoom_range();
        Self {
            id: desc.id.clone(),
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            min_zoom,
            max_zoom,
            tile_size: desc.tile_size.unwrap_or(default_tile_size),
        }
    }
}

/// Decoded content of one remote tile.
#[derive(Debug, Clone)]
pub enum TilePayload {
    Vector(Vec<SubLayerVertices>),
    Image(ImageTile),
}

pub enum Layer {
    Vector(VectorLayer),
    Image(ImageLayer),
    GeoJson(GeoJsonLayer),
}

impl Layer {
    /// Builds a layer. Unknown kinds give `Ok(None)`.
    pub fn from_descriptor(desc: LayerDescriptor) -> Result<Option<Layer>> {
        let Ok(kind) = desc.kind.parse::<LayerKind>() else {
            log::debug!("ignoring layer '{}' of unknown type '{}'", desc.id, desc.kind);
            return Ok(None);
        };
        let layer = match kind {
            LayerKind::Vector => {
                let props = LayerProperties::from_descriptor(&desc, DEFAULT_VECTOR_TILE_SIZE);
                let sub_layers = desc.sub_layers.clone().unwrap_or_else(SubLayerStyle::defaults);
                Layer::Vector(VectorLayer::new(props, desc.require_url()?, sub_layers))
            }
            LayerKind::Image => {
                let props = LayerProperties::from_descriptor(&desc, DEFAULT_IMAGE_TILE_SIZE);
                Layer::Image(ImageLayer::new(props, desc.require_url()?))
            }
            LayerKind::GeoJson => {
                let source = match (&desc.data, &desc.url) {
                    (Some(data), _) => data.clone(),
                    (None, Some(url)) => GeoJsonSource::Url(url.clone()),
                    (None, None) => {
                        return Err(MapError::Layer(format!(
                            "geojson layer '{}' needs data or a url",
                            desc.id
                        )))
                    }
                };
                let mut style = LayerStyle::default();
                if let Some(s) = &desc.style {
                    if let Some(color) = &s.color {
                        style.set_color(color)?;
                    }
                    if let Some(opacity) = s.opacity {
                        style.set_opacity(opacity)?;
                    }
                }
                let props = LayerProperties::from_descriptor(&desc, DEFAULT_VECTOR_TILE_SIZE);
                Layer::GeoJson(GeoJsonLayer::new(props, source, style))
            }
        };
        Ok(Some(layer))
    }

    pub fn properties(&self) -> &LayerProperties {
        match self {
            Layer::Vector(l) => l.properties(),
            Layer::Image(l) => l.properties(),
            Layer::GeoJson(l) => l.properties(),
        }
    }

    pub fn id(&self) -> &str {
        &self.properties().id
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Vector(_) => LayerKind::Vector,
            Layer::Image(_) => LayerKind::Image,
            Layer::GeoJson(_) => LayerKind::GeoJson,
        }
    }

    pub fn min_zoom(&self) -> f64 {
        self.properties().min_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        self.properties().max_zoom
    }

    /// True when tiles at `zoom` are deeper than the layer serves.
    pub fn exceeds_max_zoom(&self, zoom: u8) -> bool {
        zoom as f64 > self.max_zoom()
    }

    pub fn tile_state(&self, tile: &TileId) -> TileState {
        match self {
            Layer::Vector(l) => l.tile_state(tile),
            Layer::Image(l) => l.tile_state(tile),
            Layer::GeoJson(l) => l.tile_state(tile),
        }
    }

    pub fn cached_tiles(&self) -> usize {
        match self {
            Layer::Vector(l) => l.cached_tiles(),
            Layer::Image(l) => l.cached_tiles(),
            Layer::GeoJson(l) => l.cached_tiles(),
        }
    }

    /// Loads whatever `visible.to_load` still lacks. In-view tiles are awaited,
    /// buffered ones go to the pool. Returns the tiles that failed here.
    pub async fn ensure_tiles(&mut self, visible: &VisibleTiles, pool: &mut TileWorkerPool) -> Vec<TileId> {
        match self {
            Layer::Vector(l) => l.ensure_tiles(visible, pool).await,
            Layer::Image(l) => l.ensure_tiles(visible, pool).await,
            Layer::GeoJson(l) => l.ensure_tiles(visible),
        }
    }

    /// Stores a background result and returns the tile's settled state.
    /// `None` means the result was not expected and was dropped.
    pub fn accept(&mut self, result: TileJobResult) -> Option<TileState> {
        match self {
            Layer::Vector(l) => l.accept(result),
            Layer::Image(l) => l.accept(result),
            Layer::GeoJson(_) => None,
        }
    }

    /// Draws a loaded tile and returns the number of draw calls issued.
    /// Tiles without a loaded record draw nothing.
    pub fn draw_tile(&self, tile: &TileId, matrix: &[f32; 9], surface: &mut dyn RenderSurface) -> Result<usize> {
        match self {
            Layer::Vector(l) => l.draw_tile(tile, matrix, surface),
            Layer::Image(l) => l.draw_tile(tile, matrix, surface),
            Layer::GeoJson(l) => l.draw_tile(tile, matrix, surface),
        }
    }

    pub fn style(&self) -> Option<&LayerStyle> {
        match self {
            Layer::GeoJson(l) => Some(l.style()),
            _ => None,
        }
    }

    pub fn style_mut(&mut self) -> Option<&mut LayerStyle> {
        match self {
            Layer::GeoJson(l) => Some(l.style_mut()),
            _ => None,
        }
    }

    /// Releases cached payloads and cancels the layer's background jobs.
    pub fn destroy(&mut self, pool: &mut TileWorkerPool) {
        let cancelled = pool.cancel_layer(self.properties().instance);
        match self {
            Layer::Vector(l) => l.clear(),
            Layer::Image(l) => l.clear(),
            Layer::GeoJson(l) => l.clear(),
        }
        log::debug!("destroyed layer '{}' ({cancelled} jobs cancelled)", self.id());
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("cached_tiles", &self.cached_tiles())
            .finish()
    }
}
