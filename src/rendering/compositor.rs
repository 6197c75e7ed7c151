use crate::{
    core::constants::DEBUG_OUTLINE_COLOR,
    data::triangulate::rect_outline,
    layers::Layer,
    rendering::surface::RenderSurface,
    tiles::visibility::VisibleTiles,
};

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub failed_draws: usize,
    pub skipped_layers: usize,
}

/// Draws every layer's loaded in-view tiles, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RenderCompositor {
    debug: bool,
}

impl RenderCompositor {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Draws one frame. Layers deeper than their max zoom are skipped and a
    /// failing draw call is logged without stopping the frame.
    pub fn render(
        &self,
        layers: &[Layer],
        visible: &VisibleTiles,
        matrix: &[f32; 9],
        surface: &mut dyn RenderSurface,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        if let Err(e) = surface.clear() {
            log::warn!("Failed to clear surface: {e}");
            stats.failed_draws += 1;
        }

        for layer in layers {
            if layer.exceeds_max_zoom(visible.zoom) {
                log::trace!(
                    "skipping layer '{}' at zoom {} (max {})",
                    layer.id(),
                    visible.zoom,
                    layer.max_zoom()
                );
                stats.skipped_layers += 1;
                continue;
            }
            for tile in &visible.in_view {
                match layer.draw_tile(tile, matrix, surface) {
                    Ok(calls) => stats.draw_calls += calls,
                    Err(e) => {
                        log::warn!("Failed to draw tile {tile} of layer '{}': {e}", layer.id());
                        stats.failed_draws += 1;
                    }
                }
            }
        }

        if self.debug {
            for tile in &visible.in_view {
                let (sw, ne) = tile.plane_corners();
                match surface.draw_line_loop(matrix, &rect_outline(sw, ne), DEBUG_OUTLINE_COLOR) {
                    Ok(()) => stats.draw_calls += 1,
                    Err(e) => {
                        log::warn!("Failed to draw debug outline for {tile}: {e}");
                        stats.failed_draws += 1;
                    }
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::bounds::BoundingBox,
        data::geojson::GeoJson,
        layers::{GeoJsonSource, LayerDescriptor},
        rendering::surface::{DrawCall, RecordingSurface},
        tiles::{id::TileId, visibility::TileVisibilitySolver},
    };

    const IDENTITY: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    fn world_layer(id: &str, color: &str, max_zoom: f64) -> Layer {
        let doc = GeoJson::from_str(
            r#"{"type":"Polygon","coordinates":[[[-170,-80],[170,-80],[170,80],[-170,80],[-170,-80]]]}"#,
        )
        .unwrap();
        let desc = LayerDescriptor::geojson(id, GeoJsonSource::Inline(doc))
            .with_zoom_range(0.0, max_zoom)
            .with_style(Some(color), None);
        Layer::from_descriptor(desc).unwrap().unwrap()
    }

    fn loaded(mut layers: Vec<Layer>, visible: &VisibleTiles) -> Vec<Layer> {
        for layer in &mut layers {
            if let Layer::GeoJson(l) = layer {
                l.ensure_tiles(visible);
            }
        }
        layers
    }

    #[test]
    fn test_layers_draw_in_registration_order() {
        let visible = TileVisibilitySolver::new(0).solve(&BoundingBox::world(), 1.0);
        let layers = loaded(
            vec![world_layer("a", "#ff0000", 22.0), world_layer("b", "#0000ff", 22.0)],
            &visible,
        );
        let mut surface = RecordingSurface::new();
        let stats = RenderCompositor::new(false).render(&layers, &visible, &IDENTITY, &mut surface);

        assert_eq!(stats.draw_calls, 8);
        let colors: Vec<[f32; 4]> = surface
            .last_frame()
            .iter()
            .filter_map(|c| match c {
                DrawCall::Triangles { color, .. } => Some(*color),
                _ => None,
            })
            .collect();
        assert!(colors[..4].iter().all(|c| c[0] == 1.0));
        assert!(colors[4..].iter().all(|c| c[2] == 1.0));
    }

    #[test]
    fn test_only_in_view_tiles_are_drawn() {
        let visible = TileVisibilitySolver::new(1).solve(&BoundingBox::new(1.0, 1.0, 2.0, 2.0), 3.0);
        assert_eq!(visible.in_view.len(), 1);
        let layers = loaded(vec![world_layer("a", "#ff0000", 22.0)], &visible);
        assert!(layers[0].cached_tiles() > 1);

        let mut surface = RecordingSurface::new();
        let stats = RenderCompositor::default().render(&layers, &visible, &IDENTITY, &mut surface);
        assert_eq!(stats.draw_calls, 1);
    }

    #[test]
    fn test_max_zoom_skips_layer() {
        let visible = TileVisibilitySolver::new(0).solve(&BoundingBox::world(), 2.0);
        let layers = loaded(vec![world_layer("a", "#ff0000", 1.0)], &visible);
        let mut surface = RecordingSurface::new();
        let stats = RenderCompositor::new(false).render(&layers, &visible, &IDENTITY, &mut surface);
        assert_eq!(stats.skipped_layers, 1);
        assert_eq!(surface.triangle_calls(), 0);
    }

    #[test]
    fn test_debug_outlines() {
        let visible = TileVisibilitySolver::new(0).solve(&BoundingBox::world(), 1.0);
        let mut surface = RecordingSurface::new();
        RenderCompositor::new(true).render(&[], &visible, &IDENTITY, &mut surface);
        assert_eq!(surface.line_loop_calls(), 4);
        match &surface.last_frame()[0] {
            DrawCall::LineLoop { vertices, color, .. } => {
                assert_eq!(vertices.len(), 12);
                assert_eq!(*color, DEBUG_OUTLINE_COLOR);
            }
            other => panic!("unexpected draw call {other:?}"),
        }
        assert_eq!(visible.in_view[0], TileId::new(0, 0, 1));
    }

    #[test]
    fn test_failed_draws_do_not_abort_frame() {
        let visible = TileVisibilitySolver::new(0).solve(&BoundingBox::world(), 1.0);
        let layers = loaded(vec![world_layer("a", "#ff0000", 22.0)], &visible);
        let mut surface = RecordingSurface::failing();
        let stats = RenderCompositor::new(true).render(&layers, &visible, &IDENTITY, &mut surface);
        assert_eq!(stats.failed_draws, 8);
        assert_eq!(stats.draw_calls, 0);
    }
}
