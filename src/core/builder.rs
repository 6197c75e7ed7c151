//! Map builder for fluent API configuration
//!
//! [`MapBuilder`] collects construction options, engine configuration, the
//! canvas size and an optional fetcher, then produces a [`Map`] around a
//! rendering surface.

use crate::{
    core::{
        bounds::BoundaryClamp,
        config::{MapConfig, MapOptions},
        map::Map,
        viewport::CanvasSize,
    },
    input::gestures::GestureConfig,
    prelude::Arc,
    rendering::surface::RenderSurface,
    tiles::fetch::TileFetcher,
    Result,
};

/// Builder for creating and configuring Map instances
#[derive(Default)]
pub struct MapBuilder {
    options: MapOptions,
    config: MapConfig,
    canvas: CanvasSize,
    /// Falls back to an HTTP fetcher built from `config.http`
    fetcher: Option<Arc<dyn TileFetcher>>,
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preset for constrained devices
    pub fn low_resource() -> Self {
        Self::new().with_config(MapConfig::low_resource())
    }

    /// Set the initial center as `[lng, lat]`
    pub fn with_center(mut self, center: [f64; 2]) -> Self {
        self.options.center = center;
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.options.zoom = zoom;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    /// Replace all construction options at once
    pub fn with_options(mut self, options: MapOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_config(mut self, config: MapConfig) -> Self {
        self.config = config;
        self
    }

    /// Canvas size in CSS pixels with its device pixel ratio
    pub fn with_canvas(mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Self {
        self.canvas = CanvasSize::with_ratio(css_width, css_height, device_pixel_ratio);
        self
    }

    pub fn with_boundary_clamp(mut self, clamp: BoundaryClamp) -> Self {
        self.config.boundary_clamp = clamp;
        self
    }

    pub fn with_gestures(mut self, gestures: GestureConfig) -> Self {
        self.config.gestures = gestures;
        self
    }

    /// Zoom range of the camera, itself bounded by `[0, 22]`
    pub fn with_zoom_limits(mut self, min_zoom: f64, max_zoom: u8) -> Self {
        self.config.min_zoom = min_zoom;
        self.config.max_zoom = max_zoom;
        self
    }

    pub fn with_tile_buffer(mut self, buffer: u32) -> Self {
        self.config.tile_buffer = buffer;
        self
    }

    /// Use a custom fetch capability instead of HTTP
    pub fn with_fetcher(mut self, fetcher: Arc<dyn TileFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Build the map around `surface`. Fails on zoom limits outside
    /// `0 <= min <= max <= 22`.
    pub fn build<S: RenderSurface>(self, surface: S) -> Result<Map<S>> {
        self.config.validate()?;
        let fetcher = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Map::<S>::http_fetcher(&self.config.http)?,
        };
        Ok(Map::with_config(
            surface,
            self.options,
            self.config,
            fetcher,
            self.canvas,
        ))
    }
}
