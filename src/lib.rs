//! # slipmap
//!
//! A small slippy-map engine. It projects geographic coordinates onto a
//! pannable, zoomable Mercator plane, works out which tiles are visible,
//! fetches and caches tile content per layer, and composites vector, raster
//! and GeoJSON layers through an abstract rendering surface.

pub mod animation;
pub mod core;
pub mod data;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod rendering;
pub mod runtime;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::{BoundaryClamp, BoundingBox},
    builder::MapBuilder,
    camera::Camera,
    config::{MapConfig, MapOptions},
    map::Map,
    projection::Projector,
    viewport::{CanvasSize, Viewport, ViewportTransform},
};

pub use layers::{Layer, LayerDescriptor, LayerKind, LayerStyle};

pub use input::{
    events::{InputEvent, MapEvent, PointerKind},
    gestures::GestureEngine,
};

pub use rendering::{
    compositor::RenderCompositor,
    surface::{DrawCall, RecordingSurface, RenderSurface},
};

pub use tiles::{
    cache::{TileCache, TileState},
    fetch::{HttpFetcher, TileFetcher},
    id::TileId,
    visibility::{TileVisibilitySolver, VisibleTiles},
    worker::TileWorkerPool,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Layer error: {0}")]
    Layer(String),

    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Error type alias for convenience
pub type Error = MapError;
