//! Prelude module for common slipmap types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use slipmap::prelude::*;`

pub use crate::core::{
    bounds::{BoundaryClamp, BoundingBox},
    builder::MapBuilder,
    camera::Camera,
    config::{MapConfig, MapOptions},
    map::Map,
    projection::{PlanePoint, Projector},
    viewport::{CanvasSize, Viewport, ViewportTransform},
};

pub use crate::layers::{
    geojson::GeoJsonLayer, image::ImageLayer, vector::VectorLayer, Layer, LayerDescriptor,
    LayerKind, LayerStyle,
};

pub use crate::data::geojson::{GeoJson, GeoJsonFeature, GeoJsonGeometry};

pub use crate::input::{
    events::{InputEvent, MapEvent, PointerKind},
    gestures::{GestureConfig, GestureEngine},
};

pub use crate::animation::transitions::{Easing, FlyTo, FlyToConfig, ZoomAnimation};

pub use crate::tiles::{
    cache::{TileCache, TileState},
    fetch::{HttpConfig, HttpFetcher, TileFetcher},
    id::TileId,
    visibility::{TileVisibilitySolver, VisibleTiles},
    worker::{TileJob, TileJobResult, TileWorkerPool, WorkerPoolConfig},
};

pub use crate::rendering::{
    compositor::RenderCompositor,
    surface::{DrawCall, RecordingSurface, RenderSurface},
};

pub use crate::runtime::{runtime, spawn, AsyncHandle, AsyncSpawner};

pub use crate::{Error as MapError, Result};

pub use std::{
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet, FxHasher};

pub use futures::Future;
