//! Cuts GeoJSON polygons into per-tile pieces.
//!
//! Features are projected once into unit Mercator space and bulk loaded into
//! an R-tree. Tiles down to [`GEOJSON_INDEX_MAX_ZOOM`] are sliced eagerly
//! (only below non-empty parents); deeper tiles are sliced on first request
//! and memoized.

use crate::{
    core::{constants::GEOJSON_INDEX_MAX_ZOOM, projection::Projector},
    data::geojson::GeoJson,
    prelude::{Arc, HashMap},
    tiles::id::TileId,
};
use geo::{Area, BoundingRect};
use geo_types::{Coord, LineString, Polygon};
use rstar::{RTree, RTreeObject, AABB};

/// Ring in unit Mercator coordinates, not closed.
pub type UnitRing = Vec<[f64; 2]>;

/// A polygon projected into unit Mercator space.
#[derive(Debug, Clone)]
pub struct IndexedPolygon {
    polygon: Polygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl IndexedPolygon {
    fn from_lng_lat(polygon: &Polygon<f64>) -> Option<Self> {
        let project = |ring: &LineString<f64>| {
            LineString::from(
                ring.coords()
                    .map(|c| Coord {
                        x: Projector::mercator_x_from_lng(c.x),
                        y: Projector::mercator_y_from_lat(c.y),
                    })
                    .collect::<Vec<_>>(),
            )
        };
        let unit = Polygon::new(
            project(polygon.exterior()),
            polygon.interiors().iter().map(project).collect(),
        );
        if unit.unsigned_area() <= 0.0 {
            return None;
        }
        let rect = unit.bounding_rect()?;
        Some(Self {
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            polygon: unit,
        })
    }
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Clipped geometry of one tile, outer ring first in each polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlicedTile {
    pub polygons: Vec<Vec<UnitRing>>,
}

/// Memoizing tile slicer over a GeoJSON document.
pub struct GeoJsonTileIndex {
    tree: RTree<IndexedPolygon>,
    max_zoom: u8,
    buffer: f64,
    tiles: HashMap<TileId, Option<Arc<SlicedTile>>>,
}

impl GeoJsonTileIndex {
    pub fn new(doc: &GeoJson, max_zoom: u8) -> Self {
        Self::with_buffer(doc, max_zoom, 0.0)
    }

    /// `buffer` widens each tile's clip square, as a fraction of the tile width.
    pub fn with_buffer(doc: &GeoJson, max_zoom: u8, buffer: f64) -> Self {
        let items: Vec<IndexedPolygon> = doc
            .polygons()
            .iter()
            .filter_map(IndexedPolygon::from_lng_lat)
            .collect();
        log::debug!("indexing {} geojson polygons", items.len());

        let mut index = Self {
            tree: RTree::bulk_load(items),
            max_zoom,
            buffer: buffer.max(0.0),
            tiles: HashMap::default(),
        };
        index.pre_slice(TileId::new(0, 0, 0), GEOJSON_INDEX_MAX_ZOOM.min(max_zoom));
        index
    }

    pub fn feature_count(&self) -> usize {
        self.tree.size()
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Number of tiles already sliced, empty ones included.
    pub fn sliced_count(&self) -> usize {
        self.tiles.len()
    }

    fn pre_slice(&mut self, tile: TileId, depth: u8) {
        if self.tile(tile).is_none() || tile.z >= depth {
            return;
        }
        for child in tile.children() {
            self.pre_slice(child, depth);
        }
    }

    /// Geometry for `tile`, or `None` when nothing intersects it or the tile
    /// is deeper than the index allows.
    pub fn tile(&mut self, tile: TileId) -> Option<Arc<SlicedTile>> {
        if tile.z > self.max_zoom || !tile.is_valid() {
            return None;
        }
        if let Some(cached) = self.tiles.get(&tile) {
            return cached.clone();
        }
        let sliced = self.slice(&tile).map(Arc::new);
        self.tiles.insert(tile, sliced.clone());
        sliced
    }

    fn slice(&self, tile: &TileId) -> Option<SlicedTile> {
        let (min_x, min_y, max_x, max_y) = tile.unit_bounds();
        let pad = (max_x - min_x) * self.buffer;
        let (min_x, min_y, max_x, max_y) = (min_x - pad, min_y - pad, max_x + pad, max_y + pad);
        let query = AABB::from_corners([min_x, min_y], [max_x, max_y]);
        let clip = ClipRect {
            min_x,
            min_y,
            max_x,
            max_y,
        };

        let mut polygons = Vec::new();
        for item in self.tree.locate_in_envelope_intersecting(&query) {
            let exterior = clip.clip_ring(&open_ring(item.polygon.exterior()));
            if exterior.len() < 3 || ring_is_flat(&exterior) {
                continue;
            }
            let mut rings = vec![exterior];
            for hole in item.polygon.interiors() {
                let clipped = clip.clip_ring(&open_ring(hole));
                if clipped.len() >= 3 && !ring_is_flat(&clipped) {
                    rings.push(clipped);
                }
            }
            polygons.push(rings);
        }

        if polygons.is_empty() {
            None
        } else {
            Some(SlicedTile { polygons })
        }
    }
}

fn open_ring(ring: &LineString<f64>) -> UnitRing {
    let mut points: UnitRing = ring.coords().map(|c| [c.x, c.y]).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn ring_is_flat(ring: &[[f64; 2]]) -> bool {
    crate::data::mvt::ring_area(ring).abs() <= f64::EPSILON * 1e-6
}

/// Axis-aligned clip window in unit space.
#[derive(Debug, Clone, Copy)]
struct ClipRect {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl ClipRect {
    /// Sutherland-Hodgman against the four edges in turn.
    fn clip_ring(&self, ring: &[[f64; 2]]) -> UnitRing {
        let (min_x, min_y, max_x, max_y) = (self.min_x, self.min_y, self.max_x, self.max_y);
        let mut out = clip_against_edge(ring, |p| p[0] >= min_x, |a, b| {
            let t = (min_x - a[0]) / (b[0] - a[0]);
            [min_x, a[1] + t * (b[1] - a[1])]
        });
        out = clip_against_edge(&out, |p| p[0] <= max_x, |a, b| {
            let t = (max_x - a[0]) / (b[0] - a[0]);
            [max_x, a[1] + t * (b[1] - a[1])]
        });
        out = clip_against_edge(&out, |p| p[1] >= min_y, |a, b| {
            let t = (min_y - a[1]) / (b[1] - a[1]);
            [a[0] + t * (b[0] - a[0]), min_y]
        });
        clip_against_edge(&out, |p| p[1] <= max_y, |a, b| {
            let t = (max_y - a[1]) / (b[1] - a[1]);
            [a[0] + t * (b[0] - a[0]), max_y]
        })
    }
}

fn clip_against_edge<F, I>(ring: &[[f64; 2]], inside: F, intersect: I) -> UnitRing
where
    F: Fn(&[f64; 2]) -> bool,
    I: Fn(&[f64; 2], &[f64; 2]) -> [f64; 2],
{
    let mut out = Vec::with_capacity(ring.len() + 4);
    let n = ring.len();
    for i in 0..n {
        let current = &ring[i];
        let next = &ring[(i + 1) % n];
        match (inside(current), inside(next)) {
            (true, true) => out.push(*next),
            (true, false) => out.push(intersect(current, next)),
            (false, true) => {
                out.push(intersect(current, next));
                out.push(*next);
            }
            (false, false) => {}
        }
    }
    out
}
