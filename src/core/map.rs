use crate::{
    animation::transitions::{FlyTo, ZoomAnimation},
    core::{
        bounds::BoundingBox,
        camera::Camera,
        config::{MapConfig, MapOptions},
        viewport::{CanvasSize, Viewport},
    },
    input::{
        events::{InputEvent, MapEvent},
        gestures::{GestureEngine, GestureOutcome},
    },
    layers::{Layer, LayerDescriptor},
    prelude::{Arc, Instant},
    rendering::{
        compositor::{FrameStats, RenderCompositor},
        surface::RenderSurface,
    },
    tiles::{
        cache::TileState,
        fetch::{HttpConfig, HttpFetcher, TileFetcher},
        id::TileId,
        visibility::{TileVisibilitySolver, VisibleTiles},
        worker::TileWorkerPool,
    },
    MapError, Result,
};

/// The map facade.
///
/// Owns the camera (through its [`Viewport`]), the registered layers, the
/// shared tile worker pool and the rendering surface. Nothing here reacts on
/// its own: every camera mutation marks the visible tiles dirty and the next
/// [`Map::update_tiles`] or [`Map::frame`] call re-derives them.
pub struct Map<S: RenderSurface> {
    surface: S,
    options: MapOptions,
    config: MapConfig,
    viewport: Viewport,
    gestures: GestureEngine,
    solver: TileVisibilitySolver,
    compositor: RenderCompositor,
    layers: Vec<Layer>,
    pool: TileWorkerPool,
    fetcher: Arc<dyn TileFetcher>,
    visible: VisibleTiles,
    tiles_dirty: bool,
    zoom_animation: Option<ZoomAnimation>,
    flight: Option<FlyTo>,
    events: Vec<MapEvent>,
}

impl<S: RenderSurface> Map<S> {
    /// Map with the default configuration fetching over HTTP.
    pub fn new(surface: S, options: MapOptions) -> Result<Self> {
        let config = MapConfig::default();
        let fetcher: Arc<dyn TileFetcher> = HttpFetcher::shared()?;
        Ok(Self::with_config(surface, options, config, fetcher, CanvasSize::default()))
    }

    /// Map with explicit configuration, fetcher and canvas size.
    pub fn with_config(
        surface: S,
        options: MapOptions,
        config: MapConfig,
        fetcher: Arc<dyn TileFetcher>,
        canvas: CanvasSize,
    ) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("{err}; forcing zoom limits into range");
        }
        let config = config.normalized();
        let [lng, lat] = options.center;
        let camera = Camera::from_lng_lat(lng, lat, config.clamp_zoom(options.zoom));
        let viewport = Viewport::with_tile_size(camera, canvas, config.tile_size);
        let solver = TileVisibilitySolver {
            buffer: config.tile_buffer,
            max_zoom: config.max_zoom,
        };
        let visible = solver.solve(&viewport.bounds(), camera.z);
        log::debug!(
            "map created at ({lng}, {lat}) zoom {} with {} tiles in view",
            camera.z,
            visible.in_view.len()
        );

        Self {
            surface,
            gestures: GestureEngine::from_config(&config),
            compositor: RenderCompositor::new(options.debug),
            pool: TileWorkerPool::new(fetcher.clone(), config.workers.clone()),
            options,
            config,
            viewport,
            solver,
            layers: Vec::new(),
            fetcher,
            visible,
            tiles_dirty: true,
            zoom_animation: None,
            flight: None,
            events: Vec::new(),
        }
    }

    /// Builds an HTTP fetcher for `config`, reusing the shared one when the
    /// configuration is the default.
    pub fn http_fetcher(config: &HttpConfig) -> Result<Arc<dyn TileFetcher>> {
        if *config == HttpConfig::default() {
            Ok(HttpFetcher::shared()?)
        } else {
            Ok(Arc::new(HttpFetcher::new(config)?))
        }
    }

    /// Registers a layer and returns whether it was added.
    ///
    /// Descriptors of an unknown kind are ignored and give `Ok(false)`. A
    /// GeoJSON layer with a URL source is fetched and indexed before this
    /// returns. Tiles are requested on the next update.
    pub async fn add_layer(&mut self, desc: LayerDescriptor) -> Result<bool> {
        if self.layers.iter().any(|l| l.id() == desc.id) {
            return Err(MapError::Layer(format!("layer '{}' already exists", desc.id)));
        }
        let Some(mut layer) = Layer::from_descriptor(desc)? else {
            return Ok(false);
        };
        if let Layer::GeoJson(l) = &mut layer {
            l.load(self.fetcher.as_ref()).await?;
        }

        log::debug!("added {} layer '{}'", layer.kind(), layer.id());
        self.events.push(MapEvent::LayerAdded {
            layer_id: layer.id().to_string(),
        });
        self.layers.push(layer);
        self.tiles_dirty = true;
        Ok(true)
    }

    /// Removes a layer, cancelling its background jobs and dropping its tiles.
    pub fn remove_layer(&mut self, id: &str) -> bool {
        let Some(index) = self.layers.iter().position(|l| l.id() == id) else {
            return false;
        };
        let mut layer = self.layers.remove(index);
        layer.destroy(&mut self.pool);
        self.events.push(MapEvent::LayerRemoved {
            layer_id: id.to_string(),
        });
        true
    }

    pub fn get_layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    pub fn get_layer_mut(&mut self, id: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    /// Layers in registration (draw) order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Re-reads the data behind a GeoJSON layer and drops its tiles.
    pub async fn refresh_layer(&mut self, id: &str) -> Result<()> {
        let fetcher = self.fetcher.clone();
        match self.get_layer_mut(id) {
            Some(Layer::GeoJson(l)) => l.refresh(fetcher.as_ref()).await?,
            Some(other) => {
                return Err(MapError::Layer(format!(
                    "layer '{id}' is a {} layer and cannot be refreshed",
                    other.kind()
                )))
            }
            None => return Err(MapError::Layer(format!("no layer '{id}'"))),
        }
        self.tiles_dirty = true;
        Ok(())
    }

    /// Visible geographic box, clamped to the world.
    pub fn get_bounds(&self) -> BoundingBox {
        self.viewport.bounds()
    }

    /// Starts a great-circle flight to `[lng, lat]`, replacing any flight in
    /// progress. Zoom is kept.
    pub fn fly_to(&mut self, target: [f64; 2]) {
        let flight = FlyTo::new(self.center(), (target[0], target[1]), &self.config.fly_to);
        self.flight = Some(flight);
    }

    pub fn debug(&self) -> bool {
        self.compositor.debug()
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.compositor.set_debug(debug);
    }

    /// Camera centre as `(lng, lat)`.
    pub fn center(&self) -> (f64, f64) {
        self.viewport.camera().center()
    }

    pub fn set_center(&mut self, center: [f64; 2]) {
        let zoom = self.viewport.camera().z;
        self.set_camera(Camera::from_lng_lat(center[0], center[1], zoom));
    }

    pub fn zoom(&self) -> f64 {
        self.viewport.camera().z
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        let camera = self.viewport.camera();
        self.set_camera(Camera::new(camera.x, camera.y, self.config.clamp_zoom(zoom)));
    }

    fn set_camera(&mut self, camera: Camera) {
        self.viewport.set_camera(camera);
        self.view_changed();
    }

    /// Back-to-back view changes collapse into the latest one.
    fn view_changed(&mut self) {
        self.tiles_dirty = true;
        let event = MapEvent::ViewChanged {
            center: self.center(),
            zoom: self.zoom(),
        };
        match self.events.last_mut() {
            Some(last @ MapEvent::ViewChanged { .. }) => *last = event,
            _ => self.events.push(event),
        }
    }

    /// Feeds one input event to the gesture engine and refreshes the visible
    /// tiles if the view moved.
    pub async fn handle_input(&mut self, event: InputEvent) -> GestureOutcome {
        let outcome = self.gestures.handle(&event, &mut self.viewport);
        match outcome {
            GestureOutcome::CameraChanged | GestureOutcome::Resized => self.view_changed(),
            GestureOutcome::DoubleTap { clip, at } => {
                log::trace!("double tap at {clip:?}");
                self.zoom_animation = Some(ZoomAnimation::new(
                    clip,
                    at,
                    self.config.gestures.double_tap_zoom_duration_ms,
                ));
            }
            _ => {}
        }
        if self.tiles_dirty {
            self.update_tiles().await;
        }
        outcome
    }

    /// Whether a zoom animation or flight is running.
    pub fn is_animating(&self) -> bool {
        self.zoom_animation.is_some() || self.flight.is_some()
    }

    fn advance_animations(&mut self, now: Instant) {
        if let Some(animation) = self.zoom_animation.as_mut() {
            match animation.step(now) {
                Some(dz) => {
                    let anchor = animation.anchor();
                    let target = self.viewport.camera().z + dz;
                    if self.gestures.zoom_around(&mut self.viewport, anchor, target)
                        == GestureOutcome::CameraChanged
                    {
                        self.view_changed();
                    }
                }
                None => self.zoom_animation = None,
            }
        }

        if let Some(flight) = self.flight.as_mut() {
            let ((lng, lat), landed) = flight.advance(now);
            if landed {
                self.flight = None;
            }
            self.set_center([lng, lat]);
        }
    }

    /// Runs one frame: advances animations, collects background tiles,
    /// refreshes the visible tiles if needed and draws.
    pub async fn frame(&mut self, now: Instant) -> FrameStats {
        self.advance_animations(now);
        self.poll_background();
        if self.tiles_dirty {
            self.update_tiles().await;
        }
        self.render()
    }

    /// Draws the current state without touching tiles or animations.
    pub fn render(&mut self) -> FrameStats {
        let matrix = self.viewport.matrix_f32();
        self.compositor
            .render(&self.layers, &self.visible, &matrix, &mut self.surface)
    }

    /// Recomputes the visible tiles and asks every layer to make them resident.
    ///
    /// In-view tiles are awaited here; the rest go to the worker pool. Layers
    /// past their max zoom are not asked for tiles.
    pub async fn update_tiles(&mut self) {
        self.visible = self
            .solver
            .solve(&self.viewport.bounds(), self.viewport.camera().z);
        self.tiles_dirty = false;

        for layer in self.layers.iter_mut() {
            if layer.exceeds_max_zoom(self.visible.zoom) {
                continue;
            }
            let failed = layer.ensure_tiles(&self.visible, &mut self.pool).await;
            for tile in failed {
                self.events.push(MapEvent::TileFailed {
                    layer_id: layer.id().to_string(),
                    tile,
                });
            }
        }
    }

    /// Routes finished background jobs to their layers and returns how many
    /// were stored. Results of removed layers are dropped.
    pub fn poll_background(&mut self) -> usize {
        let mut stored = 0;
        for result in self.pool.try_recv_results() {
            let tile = result.tile;
            let Some(layer) = self
                .layers
                .iter_mut()
                .find(|l| l.properties().instance == result.layer)
            else {
                log::debug!("dropping tile {tile} of a removed layer");
                continue;
            };
            match layer.accept(result) {
                Some(TileState::Failed) => self.events.push(MapEvent::TileFailed {
                    layer_id: layer.id().to_string(),
                    tile,
                }),
                Some(_) => stored += 1,
                None => {}
            }
        }
        stored
    }

    pub fn visible_tiles(&self) -> &VisibleTiles {
        &self.visible
    }

    pub fn tiles_in_view(&self) -> &[TileId] {
        &self.visible.in_view
    }

    pub fn tiles_to_load(&self) -> &[TileId] {
        &self.visible.to_load
    }

    /// Background jobs still in flight.
    pub fn pending_background_tiles(&self) -> usize {
        self.pool.pending_count()
    }

    /// Drains the queued events.
    pub fn take_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::bounds::BoundaryClamp,
        data::geojson::GeoJson,
        layers::{GeoJsonSource, LayerKind},
        rendering::surface::RecordingSurface,
    };
    use approx::assert_abs_diff_eq;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoNetwork;

    #[async_trait]
    impl TileFetcher for NoNetwork {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            Err(MapError::Http {
                status: 503,
                url: url.to_string(),
            })
        }
    }

    fn map(center: [f64; 2], zoom: f64, config: MapConfig) -> Map<RecordingSurface> {
        let options = MapOptions {
            center,
            zoom,
            ..Default::default()
        };
        Map::with_config(
            RecordingSurface::new(),
            options,
            config,
            Arc::new(NoNetwork),
            CanvasSize::new(800.0, 600.0),
        )
    }

    fn square() -> LayerDescriptor {
        let doc = GeoJson::from_str(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{},
                "geometry":{"type":"Polygon","coordinates":[[[-20,-20],[20,-20],[20,20],[-20,20],[-20,-20]]]}}]}"#,
        )
        .unwrap();
        LayerDescriptor::geojson("square", GeoJsonSource::Inline(doc))
    }

    #[test]
    fn test_initial_view() {
        let map = map([0.0, 0.0], 0.0, MapConfig::for_testing());
        assert_eq!(map.tiles_in_view(), &[TileId::new(0, 0, 0)]);
        let b = map.get_bounds();
        assert_eq!(b, BoundingBox::world());
        assert_eq!(map.zoom(), 0.0);
    }

    #[tokio::test]
    async fn test_add_get_remove_layer() {
        let mut map = map([0.0, 0.0], 2.0, MapConfig::for_testing());
        assert!(map.add_layer(square()).await.unwrap());
        assert_eq!(map.get_layer("square").unwrap().kind(), LayerKind::GeoJson);
        assert!(map.add_layer(square()).await.is_err());
        assert!(!map.add_layer(LayerDescriptor::new("odd", "heatmap")).await.unwrap());
        assert_eq!(map.layers().len(), 1);

        assert!(map.remove_layer("square"));
        assert!(!map.remove_layer("square"));
        assert!(map.get_layer("square").is_none());

        let events = map.take_events();
        assert_eq!(
            events,
            vec![
                MapEvent::LayerAdded {
                    layer_id: "square".into()
                },
                MapEvent::LayerRemoved {
                    layer_id: "square".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_frame_draws_geojson() {
        let mut map = map([0.0, 0.0], 2.0, MapConfig::for_testing());
        map.add_layer(square()).await.unwrap();
        let stats = map.frame(Instant::now()).await;
        // the square touches the four tiles around the origin
        assert_eq!(stats.draw_calls, 4);
        assert_eq!(map.surface().triangle_calls(), 4);

        map.set_debug(true);
        let stats = map.render();
        assert_eq!(stats.draw_calls, 4 + map.tiles_in_view().len());
    }

    #[tokio::test]
    async fn test_failed_url_source_is_not_added() {
        let mut map = map([0.0, 0.0], 2.0, MapConfig::for_testing());
        let desc = LayerDescriptor::new("remote", "geojson").with_url("https://example.invalid/a.json");
        assert!(map.add_layer(desc).await.is_err());
        assert!(map.layers().is_empty());
    }

    #[tokio::test]
    async fn test_set_center_and_zoom() {
        let mut map = map([0.0, 0.0], 3.0, MapConfig::for_testing());
        map.set_center([12.5, 41.9]);
        let (lng, lat) = map.center();
        assert_abs_diff_eq!(lng, 12.5, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, 41.9, epsilon = 1e-9);

        map.set_zoom(30.0);
        assert_eq!(map.zoom(), 22.0);
        map.update_tiles().await;
        assert!(map.tiles_in_view().iter().all(|t| t.z == 22));
        assert!(matches!(map.take_events()[0], MapEvent::ViewChanged { .. }));
    }

    #[tokio::test]
    async fn test_out_of_range_zoom_limits_are_forced_into_range() {
        let inverted = MapConfig {
            min_zoom: 10.0,
            max_zoom: 5,
            ..MapConfig::for_testing()
        };
        let clamped = map([0.0, 0.0], 8.0, inverted);
        assert_eq!(clamped.zoom(), 5.0);
        assert_eq!(clamped.config().min_zoom, 5.0);

        for max_zoom in [30, 70] {
            let config = MapConfig {
                max_zoom,
                ..MapConfig::for_testing()
            };
            let mut map = map([0.0, 0.0], 3.0, config);
            map.set_zoom(max_zoom as f64);
            map.update_tiles().await;
            assert_eq!(map.zoom(), 22.0);
            assert!(map.viewport().camera().is_valid());
            assert!(!map.tiles_in_view().is_empty());
            assert!(map.tiles_in_view().iter().all(|t| t.z == 22));
        }
    }

    #[tokio::test]
    async fn test_view_changes_coalesce() {
        let mut map = map([0.0, 0.0], 3.0, MapConfig::for_testing());
        map.handle_input(InputEvent::mouse_down(400.0, 300.0, Instant::now()))
            .await;
        for i in 1..=1_000 {
            let x = 400.0 + (i % 20) as f64;
            map.handle_input(InputEvent::mouse_move(x, 300.0)).await;
        }
        map.set_zoom(4.0);
        let events = map.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], MapEvent::ViewChanged { zoom, .. } if zoom == 4.0));

        map.add_layer(square()).await.unwrap();
        map.set_zoom(5.0);
        map.set_zoom(6.0);
        let events = map.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MapEvent::LayerAdded { .. }));
        assert!(matches!(events[1], MapEvent::ViewChanged { zoom, .. } if zoom == 6.0));
    }

    #[tokio::test]
    async fn test_fly_to_lands_on_target() {
        let mut map = map([-74.0, 40.7], 4.0, MapConfig::for_testing());
        map.fly_to([2.35, 48.85]);
        assert!(map.is_animating());

        let start = Instant::now();
        map.frame(start).await;
        map.frame(start + Duration::from_millis(750)).await;
        let (mid_lng, _) = map.center();
        assert!(mid_lng > -74.0 && mid_lng < 2.35);

        map.frame(start + Duration::from_millis(1600)).await;
        assert!(!map.is_animating());
        let (lng, lat) = map.center();
        assert_abs_diff_eq!(lng, 2.35, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, 48.85, epsilon = 1e-9);
        assert_eq!(map.zoom(), 4.0);
        assert!(map.get_bounds().contains(2.35, 48.85));
        assert!(!map.get_bounds().contains(-74.0, 40.7));
    }

    #[tokio::test]
    async fn test_double_tap_animates_zoom() {
        let config = MapConfig {
            boundary_clamp: BoundaryClamp::Disabled,
            ..MapConfig::for_testing()
        };
        let mut map = map([0.0, 0.0], 4.0, config);
        let t0 = Instant::now();
        map.handle_input(InputEvent::mouse_down(480.0, 330.0, t0)).await;
        map.handle_input(InputEvent::mouse_up()).await;
        let tap = t0 + Duration::from_millis(120);
        let outcome = map.handle_input(InputEvent::mouse_down(480.0, 330.0, tap)).await;
        assert!(matches!(outcome, GestureOutcome::DoubleTap { .. }));
        map.handle_input(InputEvent::mouse_up()).await;

        let anchor = map.viewport().css_to_clip(480.0, 330.0);
        let before = map.viewport().clip_to_plane(anchor);
        let mut zoom = map.zoom();
        for i in 1..=25 {
            map.frame(tap + Duration::from_millis(i * 16)).await;
            assert!(map.zoom() >= zoom);
            zoom = map.zoom();
        }
        assert!(!map.is_animating());
        assert!(zoom > 4.9 && zoom <= 5.0);

        let after = map.viewport().clip_to_plane(anchor);
        assert!((before.x - after.x).abs() < 1e-6);
        assert!((before.y - after.y).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_resize_recomputes_tiles() {
        let mut map = map([0.0, 0.0], 3.0, MapConfig::for_testing());
        map.update_tiles().await;
        let before = map.tiles_in_view().len();
        let outcome = map
            .handle_input(InputEvent::Resize {
                css_width: 1600.0,
                css_height: 1200.0,
                device_pixel_ratio: 1.0,
            })
            .await;
        assert_eq!(outcome, GestureOutcome::Resized);
        assert!(map.tiles_in_view().len() > before);
    }
}
