use crate::{MapError, Result};
use image::RgbaImage;

/// Drawing target driven by the compositor.
///
/// Every call takes the 3x3 view matrix in column-major order. Vertex buffers
/// are `(x, y, 1.0)` triples in plane coordinates. Implementations report
/// failures instead of panicking; the compositor logs them and carries on.
pub trait RenderSurface {
    fn clear(&mut self) -> Result<()>;

    /// Filled triangle list in a flat colour. `blend` turns on alpha blending.
    fn draw_triangles(&mut self, matrix: &[f32; 9], vertices: &[f32], color: [f32; 4], blend: bool) -> Result<()>;

    /// Textured quad, `(x, y, 1.0, u, v)` for each of its six vertices.
    fn draw_textured_quad(&mut self, matrix: &[f32; 9], quad: &[f32; 30], image: &RgbaImage) -> Result<()>;

    fn draw_line_loop(&mut self, matrix: &[f32; 9], vertices: &[f32], color: [f32; 4]) -> Result<()>;
}

/// Commands recorded by a [`RecordingSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear,
    Triangles {
        matrix: [f32; 9],
        vertex_count: usize,
        color: [f32; 4],
        blend: bool,
    },
    TexturedQuad {
        matrix: [f32; 9],
        quad: [f32; 30],
        width: u32,
        height: u32,
    },
    LineLoop {
        matrix: [f32; 9],
        vertices: Vec<f32>,
        color: [f32; 4],
    },
}

/// Headless surface that keeps a log of what was drawn.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Vec<DrawCall>,
    fail_draws: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface whose draw calls all fail, as a broken GPU program would.
    pub fn failing() -> Self {
        Self {
            calls: Vec::new(),
            fail_draws: true,
        }
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    /// Calls since the last `Clear`.
    pub fn last_frame(&self) -> &[DrawCall] {
        let start = self
            .calls
            .iter()
            .rposition(|c| matches!(c, DrawCall::Clear))
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.calls[start..]
    }

    pub fn triangle_calls(&self) -> usize {
        self.last_frame()
            .iter()
            .filter(|c| matches!(c, DrawCall::Triangles { .. }))
            .count()
    }

    pub fn quad_calls(&self) -> usize {
        self.last_frame()
            .iter()
            .filter(|c| matches!(c, DrawCall::TexturedQuad { .. }))
            .count()
    }

    pub fn line_loop_calls(&self) -> usize {
        self.last_frame()
            .iter()
            .filter(|c| matches!(c, DrawCall::LineLoop { .. }))
            .count()
    }

    fn check(&self) -> Result<()> {
        if self.fail_draws {
            Err(MapError::Runtime("draw program unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl RenderSurface for RecordingSurface {
    fn clear(&mut self) -> Result<()> {
        self.calls.push(DrawCall::Clear);
        Ok(())
    }

    fn draw_triangles(&mut self, matrix: &[f32; 9], vertices: &[f32], color: [f32; 4], blend: bool) -> Result<()> {
        self.check()?;
        self.calls.push(DrawCall::Triangles {
            matrix: *matrix,
            vertex_count: vertices.len() / 3,
            color,
            blend,
        });
        Ok(())
    }

    fn draw_textured_quad(&mut self, matrix: &[f32; 9], quad: &[f32; 30], image: &RgbaImage) -> Result<()> {
        self.check()?;
        self.calls.push(DrawCall::TexturedQuad {
            matrix: *matrix,
            quad: *quad,
            width: image.width(),
            height: image.height(),
        });
        Ok(())
    }

    fn draw_line_loop(&mut self, matrix: &[f32; 9], vertices: &[f32], color: [f32; 4]) -> Result<()> {
        self.check()?;
        self.calls.push(DrawCall::LineLoop {
            matrix: *matrix,
            vertices: vertices.to_vec(),
            color,
        });
        Ok(())
    }
}
