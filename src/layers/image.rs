use crate::{
    layers::{remote::RemoteTiles, LayerProperties, TilePayload},
    rendering::surface::RenderSurface,
    tiles::{
        cache::TileState,
        id::TileId,
        visibility::VisibleTiles,
        worker::{JobKind, TileJobResult, TileWorkerPool},
    },
    Result,
};
use image::{imageops, RgbaImage};

/// A decoded raster tile and the quad it is drawn on.
#[derive(Debug, Clone)]
pub struct ImageTile {
    /// RGBA pixels, bottom row first so `uv (0, 0)` is the south-west corner.
    pub bitmap: RgbaImage,
    /// Two triangles, `(x, y, 1.0, u, v)` per vertex.
    pub quad: [f32; 30],
}

pub fn decode_image_tile(bytes: &[u8], tile: &TileId) -> Result<ImageTile> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(ImageTile {
        bitmap: imageops::flip_vertical(&decoded.to_rgba8()),
        quad: quad_vertices(tile),
    })
}

/// Textured quad spanning the tile's plane bounds.
pub fn quad_vertices(tile: &TileId) -> [f32; 30] {
    let (sw, ne) = tile.plane_corners();
    let (min_x, min_y, max_x, max_y) = (sw.x as f32, sw.y as f32, ne.x as f32, ne.y as f32);
    #[rustfmt::skip]
    let quad = [
        min_x, min_y, 1.0, 0.0, 0.0,
        max_x, min_y, 1.0, 1.0, 0.0,
        min_x, max_y, 1.0, 0.0, 1.0,
        min_x, max_y, 1.0, 0.0, 1.0,
        max_x, min_y, 1.0, 1.0, 0.0,
        max_x, max_y, 1.0, 1.0, 1.0,
    ];
    quad
}

/// Remote raster layer.
#[derive(Debug)]
pub struct ImageLayer {
    props: LayerProperties,
    tiles: RemoteTiles,
}

impl ImageLayer {
    pub fn new(props: LayerProperties, url: String) -> Self {
        Self {
            props,
            tiles: RemoteTiles::new(url),
        }
    }

    pub fn properties(&self) -> &LayerProperties {
        &self.props
    }

    pub fn url(&self) -> &str {
        self.tiles.url()
    }

    pub fn tile_state(&self, tile: &TileId) -> TileState {
        self.tiles.state(tile)
    }

    pub fn tile(&self, tile: &TileId) -> Option<&ImageTile> {
        match self.tiles.get(tile) {
            Some(TilePayload::Image(image)) => Some(image),
            _ => None,
        }
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub async fn ensure_tiles(&mut self, visible: &VisibleTiles, pool: &mut TileWorkerPool) -> Vec<TileId> {
        self.tiles
            .ensure(&self.props, JobKind::Image, visible, pool)
            .await
    }

    pub fn accept(&mut self, result: TileJobResult) -> Option<TileState> {
        self.tiles
            .accept(result, |p| matches!(p, TilePayload::Image(_)))
    }

    pub fn draw_tile(&self, tile: &TileId, matrix: &[f32; 9], surface: &mut dyn RenderSurface) -> Result<usize> {
        match self.tile(tile) {
            Some(image) => {
                surface.draw_textured_quad(matrix, &image.quad, &image.bitmap)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::sample_png;
    use super::*;
    use image::Rgba;

    #[test]
    fn test_decode_flips_rows() {
        let tile = decode_image_tile(&sample_png(), &TileId::new(0, 0, 0)).unwrap();
        assert_eq!(tile.bitmap.dimensions(), (2, 2));
        assert_eq!(*tile.bitmap.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(*tile.bitmap.get_pixel(0, 1), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_quad_spans_tile() {
        let quad = quad_vertices(&TileId::new(0, 0, 0));
        assert_eq!(quad[0], -1.0);
        assert_eq!(quad[5], 1.0);
        assert!((quad[26] - 1.0).abs() < 1e-3);
        assert_eq!(&quad[28..30], &[1.0, 1.0]);
        assert!(quad.chunks(5).all(|v| v[2] == 1.0));
    }

    #[test]
    fn test_bad_image() {
        let err = decode_image_tile(b"not an image", &TileId::new(0, 0, 0)).unwrap_err();
        assert!(matches!(err, crate::MapError::Image(_)));
    }
}
