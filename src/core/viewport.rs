use crate::core::{
    bounds::{BoundaryClamp, BoundingBox},
    camera::Camera,
    constants::{MAX_LATITUDE, MAX_LONGITUDE, TILE_SIZE},
    projection::{PlanePoint, Projector},
};
use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Size of the drawing surface in CSS pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub css_width: f64,
    pub css_height: f64,
    pub device_pixel_ratio: f64,
}

impl CanvasSize {
    pub fn new(css_width: f64, css_height: f64) -> Self {
        Self::with_ratio(css_width, css_height, 1.0)
    }

    pub fn with_ratio(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> Self {
        let device_pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self {
            css_width: css_width.max(0.0),
            css_height: css_height.max(0.0),
            device_pixel_ratio,
        }
    }

    /// Drawing-buffer width in device pixels.
    pub fn pixel_width(&self) -> f64 {
        (self.css_width * self.device_pixel_ratio).round()
    }

    /// Drawing-buffer height in device pixels.
    pub fn pixel_height(&self) -> f64 {
        (self.css_height * self.device_pixel_ratio).round()
    }

    /// Converts a CSS position relative to the canvas origin into clip space.
    pub fn css_to_clip(&self, css_x: f64, css_y: f64) -> [f64; 2] {
        let nx = css_x / self.css_width;
        let ny = css_y / self.css_height;
        [nx * 2.0 - 1.0, ny * -2.0 + 1.0]
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(512.0, 512.0)
    }
}

/// Pure functions deriving the view matrix and the visible box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportTransform;

impl ViewportTransform {
    /// Clip space to plane: translate by the camera, then scale by zoom and
    /// canvas size. The view matrix is its inverse.
    pub fn camera_matrix(camera: &Camera, width_px: f64, height_px: f64, tile_size: f64) -> Matrix3<f64> {
        let zoom_scale = 2f64.powf(-camera.z);
        let scale = Vector2::new(
            zoom_scale * width_px / tile_size,
            zoom_scale * height_px / tile_size,
        );
        Matrix3::new_translation(&Vector2::new(camera.x, camera.y))
            * Matrix3::new_nonuniform_scaling(&scale)
    }

    /// Plane to clip space. `None` when the canvas has no area.
    pub fn compute_matrix(
        camera: &Camera,
        width_px: f64,
        height_px: f64,
        tile_size: f64,
    ) -> Option<Matrix3<f64>> {
        Self::camera_matrix(camera, width_px, height_px, tile_size).try_inverse()
    }

    /// Visible box before clamping to the world.
    pub fn compute_raw_bounds(camera: &Camera, width_px: f64, height_px: f64, tile_size: f64) -> BoundingBox {
        let zoom_scale = 2f64.powf(camera.z);
        let px = (1.0 + camera.x) / 2.0;
        let py = (1.0 - camera.y) / 2.0;
        let zx = px * tile_size * zoom_scale;
        let zy = py * tile_size * zoom_scale;

        let to_unit = |v: f64| v / zoom_scale / tile_size;
        let x1 = to_unit(zx - width_px / 2.0);
        let y1 = to_unit(zy + height_px / 2.0);
        let x2 = to_unit(zx + width_px / 2.0);
        let y2 = to_unit(zy - height_px / 2.0);

        BoundingBox::new(
            Projector::lng_from_mercator_x(x1),
            Projector::lat_from_mercator_y(y1),
            Projector::lng_from_mercator_x(x2),
            Projector::lat_from_mercator_y(y2),
        )
    }

    /// Visible box clamped to `[-180,180] × [-85.05,85.05]`.
    pub fn compute_bounds(camera: &Camera, width_px: f64, height_px: f64, tile_size: f64) -> BoundingBox {
        Self::compute_raw_bounds(camera, width_px, height_px, tile_size)
            .clamped(MAX_LONGITUDE, MAX_LATITUDE)
    }
}

/// Camera, canvas and everything derived from them.
///
/// The camera can only be replaced through [`Viewport::set_camera`], which
/// recomputes the matrix and bounds before returning.
#[derive(Debug, Clone)]
pub struct Viewport {
    camera: Camera,
    canvas: CanvasSize,
    tile_size: f64,
    matrix: Matrix3<f64>,
    world_from_clip: Matrix3<f64>,
    raw_bounds: BoundingBox,
    bounds: BoundingBox,
}

impl Viewport {
    pub fn new(camera: Camera, canvas: CanvasSize) -> Self {
        Self::with_tile_size(camera, canvas, TILE_SIZE)
    }

    pub fn with_tile_size(camera: Camera, canvas: CanvasSize, tile_size: u32) -> Self {
        let mut viewport = Self {
            camera,
            canvas,
            tile_size: tile_size.max(1) as f64,
            matrix: Matrix3::zeros(),
            world_from_clip: Matrix3::zeros(),
            raw_bounds: BoundingBox::world(),
            bounds: BoundingBox::world(),
        };
        viewport.recompute();
        viewport
    }

    /// Re-derive matrix and bounds from the current camera and canvas.
    pub fn recompute(&mut self) {
        let (w, h) = (self.canvas.pixel_width(), self.canvas.pixel_height());
        self.world_from_clip = ViewportTransform::camera_matrix(&self.camera, w, h, self.tile_size);
        self.matrix = self.world_from_clip.try_inverse().unwrap_or_else(Matrix3::zeros);
        self.raw_bounds = ViewportTransform::compute_raw_bounds(&self.camera, w, h, self.tile_size);
        self.bounds = self.raw_bounds.clamped(MAX_LONGITUDE, MAX_LATITUDE);
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
        self.recompute();
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn resize(&mut self, canvas: CanvasSize) {
        self.canvas = canvas;
        self.recompute();
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Plane-to-clip matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Column-major single precision copy for the rendering surface.
    pub fn matrix_f32(&self) -> [f32; 9] {
        let mut out = [0f32; 9];
        for (dst, src) in out.iter_mut().zip(self.matrix.iter()) {
            *dst = *src as f32;
        }
        out
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn raw_bounds(&self) -> BoundingBox {
        self.raw_bounds
    }

    pub fn at_limits(&self, clamp: &BoundaryClamp) -> bool {
        clamp.at_limits(&self.raw_bounds)
    }

    pub fn css_to_clip(&self, css_x: f64, css_y: f64) -> [f64; 2] {
        self.canvas.css_to_clip(css_x, css_y)
    }

    /// Inverse-projects a clip position onto the plane through the current matrix.
    pub fn clip_to_plane(&self, clip: [f64; 2]) -> PlanePoint {
        if self.matrix == Matrix3::zeros() {
            return PlanePoint::new(f64::NAN, f64::NAN);
        }
        let v = self.world_from_clip * Vector3::new(clip[0], clip[1], 1.0);
        PlanePoint::new(v.x, v.y)
    }

    pub fn plane_to_clip(&self, point: PlanePoint) -> [f64; 2] {
        let v = self.matrix * Vector3::new(point.x, point.y, 1.0);
        [v.x, v.y]
    }
}
