use crate::{
    core::projection::{PlanePoint, Projector},
    data::{
        mvt::{tile_point_to_lng_lat, GeomType, VectorTile},
        triangulate::triangulate_polygon,
    },
    layers::{remote::RemoteTiles, LayerProperties, SubLayerStyle, TilePayload},
    prelude::Arc,
    rendering::surface::RenderSurface,
    tiles::{
        cache::TileState,
        id::TileId,
        visibility::VisibleTiles,
        worker::{JobKind, TileJobResult, TileWorkerPool},
    },
    Result,
};
use serde::{Deserialize, Serialize};

/// Triangles of one named sub-layer in plane coordinates, `(x, y, 1.0)` per vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubLayerVertices {
    pub name: String,
    pub vertices: Vec<f32>,
}

/// Decodes an MVT tile into per-sub-layer triangle lists.
///
/// Only sub-layers named in `sub_layers` are kept, in that order. Polygons
/// keep their holes; lines and points produce no fill.
pub fn decode_vector_tile(bytes: &[u8], tile: &TileId, sub_layers: &[SubLayerStyle]) -> Result<Vec<SubLayerVertices>> {
    let decoded = VectorTile::decode(bytes)?;
    let mut out = Vec::with_capacity(sub_layers.len());

    for style in sub_layers {
        let Some(layer) = decoded.layer(&style.name) else {
            continue;
        };
        let mut vertices = Vec::new();
        for feature in layer.features.iter().filter(|f| f.geom_type == GeomType::Polygon) {
            let polygons = match feature.polygons() {
                Ok(polygons) => polygons,
                Err(e) => {
                    log::trace!("skipping feature in '{}': {e:#}", layer.name);
                    continue;
                }
            };
            for rings in polygons {
                let plane: Vec<Vec<PlanePoint>> = rings
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|p| {
                                let (lng, lat) = tile_point_to_lng_lat(*p, layer.extent, tile);
                                Projector::lng_lat_to_plane(lng, lat)
                            })
                            .collect()
                    })
                    .collect();
                vertices.extend(triangulate_polygon(&plane));
            }
        }
        out.push(SubLayerVertices {
            name: style.name.clone(),
            vertices,
        });
    }
    Ok(out)
}

/// Remote MVT layer.
#[derive(Debug)]
pub struct VectorLayer {
    props: LayerProperties,
    sub_layers: Arc<Vec<SubLayerStyle>>,
    tiles: RemoteTiles,
}

impl VectorLayer {
    pub fn new(props: LayerProperties, url: String, sub_layers: Vec<SubLayerStyle>) -> Self {
        Self {
            props,
            sub_layers: Arc::new(sub_layers),
            tiles: RemoteTiles::new(url),
        }
    }

    pub fn properties(&self) -> &LayerProperties {
        &self.props
    }

    pub fn url(&self) -> &str {
        self.tiles.url()
    }

    pub fn sub_layers(&self) -> &[SubLayerStyle] {
        &self.sub_layers
    }

    pub fn tile_state(&self, tile: &TileId) -> TileState {
        self.tiles.state(tile)
    }

    pub fn tile(&self, tile: &TileId) -> Option<&[SubLayerVertices]> {
        match self.tiles.get(tile) {
            Some(TilePayload::Vector(subs)) => Some(subs),
            _ => None,
        }
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub async fn ensure_tiles(&mut self, visible: &VisibleTiles, pool: &mut TileWorkerPool) -> Vec<TileId> {
        let kind = JobKind::Vector {
            sub_layers: self.sub_layers.clone(),
        };
        self.tiles.ensure(&self.props, kind, visible, pool).await
    }

    pub fn accept(&mut self, result: TileJobResult) -> Option<TileState> {
        self.tiles
            .accept(result, |p| matches!(p, TilePayload::Vector(_)))
    }

    pub fn draw_tile(&self, tile: &TileId, matrix: &[f32; 9], surface: &mut dyn RenderSurface) -> Result<usize> {
        let Some(subs) = self.tile(tile) else {
            return Ok(0);
        };
        let mut calls = 0;
        for sub in subs.iter().filter(|s| !s.vertices.is_empty()) {
            let Some(style) = self.sub_layers.iter().find(|s| s.name == sub.name) else {
                continue;
            };
            surface.draw_triangles(matrix, &sub.vertices, style.rgba(), false)?;
            calls += 1;
        }
        Ok(calls)
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}
