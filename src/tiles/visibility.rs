use crate::{
    core::{bounds::BoundingBox, constants::{MAX_ZOOM, TILE_BUFFER}},
    prelude::HashSet,
    tiles::id::TileId,
};

/// Output of the visibility solver.
///
/// `in_view` is the exact visible rectangle in x-major order. `to_load` starts
/// with `in_view`, followed by the buffer ring and ancestors, without
/// duplicates and restricted to valid ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleTiles {
    pub zoom: u8,
    pub in_view: Vec<TileId>,
    pub to_load: Vec<TileId>,
}

impl VisibleTiles {
    pub fn is_in_view(&self, tile: &TileId) -> bool {
        tile.z == self.zoom && self.in_view.contains(tile)
    }

    pub fn in_view_set(&self) -> HashSet<TileId> {
        self.in_view.iter().copied().collect()
    }

    pub fn to_load_set(&self) -> HashSet<TileId> {
        self.to_load.iter().copied().collect()
    }
}

/// Enumerates visible tiles and the prefetch set for a box and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileVisibilitySolver {
    /// Ring width around the visible rectangle.
    pub buffer: u32,
    pub max_zoom: u8,
}

impl Default for TileVisibilitySolver {
    fn default() -> Self {
        Self {
            buffer: TILE_BUFFER,
            max_zoom: MAX_ZOOM,
        }
    }
}

impl TileVisibilitySolver {
    pub fn new(buffer: u32) -> Self {
        Self {
            buffer,
            ..Default::default()
        }
    }

    /// Pure function of `(bbox, zoom)`.
    pub fn solve(&self, bbox: &BoundingBox, zoom: f64) -> VisibleTiles {
        let z = (zoom.trunc().max(0.0) as u8).min(self.max_zoom.min(MAX_ZOOM));
        let last = (1i64 << z) - 1;

        let (min_x, min_y) = TileId::index_of(bbox.min_lng, bbox.max_lat, z);
        let (max_x, max_y) = TileId::index_of(bbox.max_lng, bbox.min_lat, z);
        let (min_x, min_y) = (min_x.max(0), min_y.max(0));
        let (max_x, max_y) = (max_x.min(last), max_y.min(last));

        let mut in_view = Vec::new();
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                if let Some(tile) = TileId::checked(x, y, z as i64) {
                    in_view.push(tile);
                }
            }
        }

        let mut seen: HashSet<TileId> = in_view.iter().copied().collect();
        let mut to_load = in_view.clone();
        let mut push = |x: i64, y: i64, z: i64| {
            if let Some(tile) = TileId::checked(x, y, z) {
                if seen.insert(tile) {
                    to_load.push(tile);
                }
            }
        };

        let b = self.buffer as i64;
        let z = z as i64;
        for x in (min_x - b)..=(max_x + b) {
            for y in (min_y - b)..=(max_y + b) {
                push(x, y, z);
                push(x.div_euclid(2), y.div_euclid(2), z - 1);
                push(x.div_euclid(4), y.div_euclid(4), z - 2);
            }
        }

        VisibleTiles {
            zoom: z as u8,
            in_view,
            to_load,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{camera::Camera, viewport::ViewportTransform};

    fn bbox_for(camera: Camera, w: f64, h: f64) -> BoundingBox {
        ViewportTransform::compute_bounds(&camera, w, h, 256.0)
    }

    #[test]
    fn test_zoom_zero_is_single_tile() {
        let tiles = TileVisibilitySolver::default().solve(&BoundingBox::world(), 0.0);
        assert_eq!(tiles.in_view, vec![TileId::new(0, 0, 0)]);
        assert_eq!(tiles.to_load, vec![TileId::new(0, 0, 0)]);
    }

    #[test]
    fn test_ring_and_ancestors() {
        let camera = Camera::from_lng_lat(10.0, 45.0, 6.0);
        let tiles = TileVisibilitySolver::default().solve(&bbox_for(camera, 512.0, 512.0), camera.z);
        let to_load = tiles.to_load_set();

        for tile in &tiles.in_view {
            assert!(to_load.contains(tile));
            let parent = tile.parent().unwrap();
            assert!(to_load.contains(&parent));
            assert!(to_load.contains(&parent.parent().unwrap()));
        }

        let xs: Vec<u32> = tiles.in_view.iter().map(|t| t.x).collect();
        let min_x = *xs.iter().min().unwrap();
        let ring = TileId::new(min_x - 1, tiles.in_view[0].y, 6);
        assert!(to_load.contains(&ring));
        assert!(!tiles.in_view.contains(&ring));
    }

    #[test]
    fn test_to_load_is_always_valid() {
        let solver = TileVisibilitySolver::new(2);
        for (lng, lat, z) in [(-179.0, 84.0, 3.0), (179.0, -84.0, 7.5), (0.0, 0.0, 22.0), (0.0, 0.0, 1.0)] {
            let camera = Camera::from_lng_lat(lng, lat, z);
            let tiles = solver.solve(&bbox_for(camera, 1920.0, 1080.0), camera.z);
            for tile in tiles.to_load.iter().chain(tiles.in_view.iter()) {
                assert!(tile.is_valid(), "{tile} is not a valid tile");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let solver = TileVisibilitySolver::default();
        let camera = Camera::from_lng_lat(-73.9, 40.7, 11.2);
        let bbox = bbox_for(camera, 800.0, 600.0);
        let first = solver.solve(&bbox, camera.z);
        let _ = solver.solve(&BoundingBox::world(), 2.0);
        assert_eq!(first, solver.solve(&bbox, camera.z));
    }

    #[test]
    fn test_no_duplicates() {
        let camera = Camera::from_lng_lat(2.35, 48.85, 9.0);
        let tiles = TileVisibilitySolver::default().solve(&bbox_for(camera, 1024.0, 768.0), camera.z);
        assert_eq!(tiles.to_load.len(), tiles.to_load_set().len());
    }

    #[test]
    fn test_zoom_capped() {
        let tiles = TileVisibilitySolver::default().solve(&BoundingBox::new(0.0, 0.0, 0.0001, 0.0001), 30.0);
        assert_eq!(tiles.zoom, 22);
    }

    #[test]
    fn test_oversized_max_zoom_is_capped() {
        let solver = TileVisibilitySolver {
            buffer: 1,
            max_zoom: 70,
        };
        let tiles = solver.solve(&BoundingBox::new(0.0, 0.0, 0.0001, 0.0001), 70.0);
        assert_eq!(tiles.zoom, 22);
        assert!(!tiles.in_view.is_empty());
    }
}
