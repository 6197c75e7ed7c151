use crate::{
    core::projection::{PlanePoint, Projector},
    data::{geojson::GeoJson, slicer::GeoJsonTileIndex, triangulate::triangulate_polygon},
    layers::{GeoJsonSource, LayerProperties, LayerStyle},
    rendering::surface::RenderSurface,
    tiles::{cache::{TileCache, TileState}, fetch::TileFetcher, id::TileId, visibility::VisibleTiles},
    Result,
};

/// Layer over a static feature collection, sliced into tiles locally.
pub struct GeoJsonLayer {
    props: LayerProperties,
    source: GeoJsonSource,
    index: Option<GeoJsonTileIndex>,
    cache: TileCache<Vec<f32>>,
    style: LayerStyle,
}

impl GeoJsonLayer {
    /// Inline data is indexed immediately; a URL source waits for [`load`](Self::load).
    pub fn new(props: LayerProperties, source: GeoJsonSource, style: LayerStyle) -> Self {
        let mut layer = Self {
            props,
            source,
            index: None,
            cache: TileCache::new(),
            style,
        };
        if let GeoJsonSource::Inline(doc) = &layer.source {
            layer.index = Some(layer.build_index(doc));
        }
        layer
    }

    fn build_index(&self, doc: &GeoJson) -> GeoJsonTileIndex {
        GeoJsonTileIndex::new(doc, self.props.max_zoom as u8)
    }

    pub fn properties(&self) -> &LayerProperties {
        &self.props
    }

    pub fn source(&self) -> &GeoJsonSource {
        &self.source
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    pub fn style(&self) -> &LayerStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut LayerStyle {
        &mut self.style
    }

    /// Fetches a URL source if it has not been indexed yet.
    pub async fn load(&mut self, fetcher: &dyn TileFetcher) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }
        let url = match &self.source {
            GeoJsonSource::Url(url) => url.clone(),
            GeoJsonSource::Inline(doc) => {
                self.index = Some(self.build_index(doc));
                return Ok(());
            }
        };
        let bytes = fetcher.fetch(&url).await?;
        let doc = GeoJson::from_slice(&bytes)?;
        log::debug!(
            "layer '{}': loaded {} features from {url}",
            self.props.id,
            doc.features().len()
        );
        self.index = Some(self.build_index(&doc));
        Ok(())
    }

    /// Drops every tile and rebuilds the index, refetching a URL source.
    pub async fn refresh(&mut self, fetcher: &dyn TileFetcher) -> Result<()> {
        self.cache.clear();
        self.index = None;
        self.load(fetcher).await
    }

    /// Replaces the features with an inline collection.
    pub fn set_data(&mut self, doc: GeoJson) {
        self.clear();
        self.index = Some(self.build_index(&doc));
        self.source = GeoJsonSource::Inline(doc);
    }

    pub fn tile_state(&self, tile: &TileId) -> TileState {
        self.cache.state(tile)
    }

    pub fn tile(&self, tile: &TileId) -> Option<&[f32]> {
        self.cache.get(tile).map(Vec::as_slice)
    }

    pub fn cached_tiles(&self) -> usize {
        self.cache.len()
    }

    /// Triangulates sliced tiles that are not cached yet. Empty tiles get no record.
    pub fn ensure_tiles(&mut self, visible: &VisibleTiles) -> Vec<TileId> {
        let Some(index) = self.index.as_mut() else {
            log::debug!("layer '{}' has no data yet", self.props.id);
            return Vec::new();
        };
        for tile in &visible.to_load {
            if self.cache.state(tile) != TileState::Absent {
                continue;
            }
            let Some(sliced) = index.tile(*tile) else {
                continue;
            };
            let mut vertices = Vec::new();
            for rings in &sliced.polygons {
                let plane: Vec<Vec<PlanePoint>> = rings
                    .iter()
                    .map(|ring| ring.iter().map(|p| Projector::unit_to_plane(p[0], p[1])).collect())
                    .collect();
                vertices.extend(triangulate_polygon(&plane));
            }
            if !vertices.is_empty() {
                self.cache.insert_loaded(*tile, vertices);
            }
        }
        Vec::new()
    }

    pub fn draw_tile(&self, tile: &TileId, matrix: &[f32; 9], surface: &mut dyn RenderSurface) -> Result<usize> {
        match self.tile(tile) {
            Some(vertices) => {
                surface.draw_triangles(matrix, vertices, self.style.rgba(), true)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    /// Drops cached tiles. A URL source also drops its index.
    pub fn clear(&mut self) {
        self.cache.clear();
        if matches!(self.source, GeoJsonSource::Url(_)) {
            self.index = None;
        }
    }
}
