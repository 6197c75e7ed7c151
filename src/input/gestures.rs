//! Pointer and wheel handling for the camera.
//!
//! A pointer is either idle or dragging. Every camera mutation is checked
//! against the boundary clamp and rolled back to the saved camera when the
//! new view reaches a hard limit.

use crate::{
    core::{
        bounds::BoundaryClamp,
        camera::Camera,
        config::MapConfig,
        viewport::{CanvasSize, Viewport},
    },
    input::events::{InputEvent, PointerKind},
    prelude::HashMap,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub dragging: bool,
    pub scroll_wheel_zoom: bool,
    pub double_tap_zoom: bool,
    /// Two pointer-downs on one device closer than this form a double tap.
    pub double_tap_timeout_ms: u64,
    pub double_tap_zoom_duration_ms: u64,
    /// Wheel delta that amounts to one zoom level.
    pub wheel_zoom_divisor: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            dragging: true,
            scroll_wheel_zoom: true,
            double_tap_zoom: true,
            double_tap_timeout_ms: 400,
            double_tap_zoom_duration_ms: 300,
            wheel_zoom_divisor: 500.0,
        }
    }
}

/// What an event did to the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Ignored,
    DragStarted,
    DragEnded,
    CameraChanged,
    /// The mutation hit the boundary clamp and was undone.
    Reverted,
    /// Second tap in a row; the caller starts a zoom animation at `clip`.
    DoubleTap { clip: [f64; 2], at: Instant },
    Resized,
}

#[derive(Debug, Clone)]
pub struct GestureEngine {
    config: GestureConfig,
    clamp: BoundaryClamp,
    min_zoom: f64,
    max_zoom: f64,
    drag_anchor: Option<[f64; 2]>,
    last_down: HashMap<PointerKind, Instant>,
}

impl GestureEngine {
    pub fn new(config: GestureConfig, clamp: BoundaryClamp, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            config,
            clamp,
            min_zoom,
            max_zoom,
            drag_anchor: None,
            last_down: HashMap::default(),
        }
    }

    pub fn from_config(config: &MapConfig) -> Self {
        Self::new(
            config.gestures.clone(),
            config.boundary_clamp,
            config.min_zoom,
            config.max_zoom as f64,
        )
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn clamp(&self) -> &BoundaryClamp {
        &self.clamp
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn handle(&mut self, event: &InputEvent, viewport: &mut Viewport) -> GestureOutcome {
        match *event {
            InputEvent::PointerDown { x, y, kind, timestamp } => self.pointer_down(viewport.css_to_clip(x, y), kind, timestamp),
            InputEvent::PointerMove { x, y, .. } => self.pointer_move(viewport.css_to_clip(x, y), viewport),
            InputEvent::PointerUp { .. } => {
                if self.drag_anchor.take().is_some() {
                    GestureOutcome::DragEnded
                } else {
                    GestureOutcome::Ignored
                }
            }
            InputEvent::Wheel { x, y, delta_y } => {
                if !self.config.scroll_wheel_zoom {
                    return GestureOutcome::Ignored;
                }
                let clip = viewport.css_to_clip(x, y);
                let target = viewport.camera().z - delta_y / self.config.wheel_zoom_divisor;
                self.zoom_around(viewport, clip, target)
            }
            InputEvent::Resize {
                css_width,
                css_height,
                device_pixel_ratio,
            } => {
                viewport.resize(CanvasSize::with_ratio(css_width, css_height, device_pixel_ratio));
                GestureOutcome::Resized
            }
        }
    }

    fn pointer_down(&mut self, clip: [f64; 2], kind: PointerKind, now: Instant) -> GestureOutcome {
        let timeout = Duration::from_millis(self.config.double_tap_timeout_ms);
        let previous = self.last_down.insert(kind, now);
        let is_double = self.config.double_tap_zoom
            && previous.is_some_and(|prev| now.saturating_duration_since(prev) < timeout);

        if is_double {
            self.last_down.remove(&kind);
            self.drag_anchor = None;
            return GestureOutcome::DoubleTap { clip, at: now };
        }
        if !self.config.dragging {
            return GestureOutcome::Ignored;
        }
        self.drag_anchor = Some(clip);
        GestureOutcome::DragStarted
    }

    fn pointer_move(&mut self, clip: [f64; 2], viewport: &mut Viewport) -> GestureOutcome {
        let Some(anchor) = self.drag_anchor else {
            return GestureOutcome::Ignored;
        };
        let from = viewport.clip_to_plane(anchor);
        let to = viewport.clip_to_plane(clip);
        let (dx, dy) = (from.x - to.x, from.y - to.y);
        if !dx.is_finite() || !dy.is_finite() {
            log::debug!("ignoring drag with non-finite delta");
            return GestureOutcome::Ignored;
        }

        let saved = viewport.camera();
        viewport.set_camera(Camera {
            x: saved.x + dx,
            y: saved.y + dy,
            ..saved
        });
        if viewport.at_limits(&self.clamp) {
            viewport.set_camera(saved);
            return GestureOutcome::Reverted;
        }
        self.drag_anchor = Some(clip);
        GestureOutcome::CameraChanged
    }

    /// Sets zoom to `target` (clamped to the configured range) while keeping
    /// the plane point under `clip` fixed on screen.
    pub fn zoom_around(&self, viewport: &mut Viewport, clip: [f64; 2], target: f64) -> GestureOutcome {
        let saved = viewport.camera();
        let z = target.clamp(self.min_zoom, self.max_zoom);
        if z == saved.z {
            return GestureOutcome::Ignored;
        }
        let before = viewport.clip_to_plane(clip);
        viewport.set_camera(Camera { z, ..saved });
        let after = viewport.clip_to_plane(clip);
        let (dx, dy) = (before.x - after.x, before.y - after.y);
        if !dx.is_finite() || !dy.is_finite() {
            viewport.set_camera(saved);
            return GestureOutcome::Ignored;
        }
        viewport.set_camera(Camera {
            x: saved.x + dx,
            y: saved.y + dy,
            z,
        });
        if viewport.at_limits(&self.clamp) {
            viewport.set_camera(saved);
            return GestureOutcome::Reverted;
        }
        GestureOutcome::CameraChanged
    }
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new(GestureConfig::default(), BoundaryClamp::default(), 0.0, 22.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn viewport(lng: f64, lat: f64, zoom: f64) -> Viewport {
        Viewport::new(Camera::from_lng_lat(lng, lat, zoom), CanvasSize::new(800.0, 600.0))
    }

    #[test]
    fn test_wheel_zoom_keeps_cursor_point() {
        let mut engine = GestureEngine::default();
        let mut vp = viewport(10.0, 45.0, 5.0);
        let (cx, cy) = (620.0, 130.0);
        let clip = vp.css_to_clip(cx, cy);
        let before = vp.clip_to_plane(clip);

        let outcome = engine.handle(&InputEvent::Wheel { x: cx, y: cy, delta_y: -250.0 }, &mut vp);
        assert_eq!(outcome, GestureOutcome::CameraChanged);
        assert_abs_diff_eq!(vp.camera().z, 5.5, epsilon = 1e-12);

        let after = vp.clip_to_plane(clip);
        assert!((before.x - after.x).abs() < 1e-6);
        assert!((before.y - after.y).abs() < 1e-6);
    }

    #[test]
    fn test_wheel_zoom_is_clamped_to_range() {
        let mut engine = GestureEngine::new(GestureConfig::default(), BoundaryClamp::Disabled, 0.0, 6.0);
        let mut vp = viewport(0.0, 0.0, 5.0);
        engine.handle(&InputEvent::Wheel { x: 400.0, y: 300.0, delta_y: -5000.0 }, &mut vp);
        assert_eq!(vp.camera().z, 6.0);
        let outcome = engine.handle(&InputEvent::Wheel { x: 400.0, y: 300.0, delta_y: -10.0 }, &mut vp);
        assert_eq!(outcome, GestureOutcome::Ignored);
    }

    #[test]
    fn test_drag_moves_camera_with_pointer() {
        let mut engine = GestureEngine::default();
        let mut vp = viewport(0.0, 0.0, 4.0);
        let t0 = Instant::now();
        let start = vp.clip_to_plane(vp.css_to_clip(400.0, 300.0));

        assert_eq!(engine.handle(&InputEvent::mouse_down(400.0, 300.0, t0), &mut vp), GestureOutcome::DragStarted);
        assert!(engine.is_dragging());
        assert_eq!(engine.handle(&InputEvent::mouse_move(450.0, 280.0), &mut vp), GestureOutcome::CameraChanged);

        // the grabbed point now sits under the pointer
        let under = vp.clip_to_plane(vp.css_to_clip(450.0, 280.0));
        assert_abs_diff_eq!(under.x, start.x, epsilon = 1e-9);
        assert_abs_diff_eq!(under.y, start.y, epsilon = 1e-9);
        assert!(vp.camera().x < 0.0);
        assert!(vp.camera().y < 0.0);

        assert_eq!(engine.handle(&InputEvent::mouse_up(), &mut vp), GestureOutcome::DragEnded);
        let camera = vp.camera();
        assert_eq!(engine.handle(&InputEvent::mouse_move(10.0, 10.0), &mut vp), GestureOutcome::Ignored);
        assert_eq!(vp.camera(), camera);
    }

    #[test]
    fn test_drag_past_edge_is_rolled_back() {
        let mut engine = GestureEngine::default();
        let mut vp = viewport(170.0, 0.0, 3.0);
        let camera = vp.camera();
        engine.handle(&InputEvent::mouse_down(400.0, 300.0, Instant::now()), &mut vp);
        // pull the map far to the left, pushing the east edge past 180°
        let outcome = engine.handle(&InputEvent::mouse_move(0.0, 300.0), &mut vp);
        assert_eq!(outcome, GestureOutcome::Reverted);
        assert_eq!(vp.camera(), camera);
        assert_eq!(vp.camera().x.to_bits(), camera.x.to_bits());
    }

    #[test]
    fn test_zoom_out_past_edge_is_rolled_back() {
        let engine = GestureEngine::default();
        let mut vp = viewport(100.0, 0.0, 3.0);
        assert!(!vp.at_limits(engine.clamp()));
        let camera = vp.camera();
        // the limit check sees the anchored camera, not the bare zoom change
        let outcome = engine.zoom_around(&mut vp, [-0.9, 0.0], 2.5);
        assert_eq!(outcome, GestureOutcome::Reverted);
        assert_eq!(vp.camera().x.to_bits(), camera.x.to_bits());
        assert_eq!(vp.camera().z.to_bits(), camera.z.to_bits());
    }

    #[test]
    fn test_disabled_clamp_allows_overshoot() {
        let mut engine = GestureEngine::new(GestureConfig::default(), BoundaryClamp::Disabled, 0.0, 22.0);
        let mut vp = viewport(170.0, 0.0, 3.0);
        engine.handle(&InputEvent::mouse_down(400.0, 300.0, Instant::now()), &mut vp);
        let outcome = engine.handle(&InputEvent::mouse_move(0.0, 300.0), &mut vp);
        assert_eq!(outcome, GestureOutcome::CameraChanged);
    }

    #[test]
    fn test_double_tap_per_device() {
        let mut engine = GestureEngine::default();
        let mut vp = viewport(0.0, 0.0, 3.0);
        let t0 = Instant::now();
        engine.handle(&InputEvent::mouse_down(100.0, 100.0, t0), &mut vp);
        engine.handle(&InputEvent::mouse_up(), &mut vp);

        // a touch in between does not count for the mouse
        let touch = InputEvent::PointerDown {
            x: 100.0,
            y: 100.0,
            kind: PointerKind::Touch,
            timestamp: t0 + Duration::from_millis(100),
        };
        assert_eq!(engine.handle(&touch, &mut vp), GestureOutcome::DragStarted);
        engine.handle(&InputEvent::PointerUp { kind: PointerKind::Touch }, &mut vp);

        let second = t0 + Duration::from_millis(250);
        match engine.handle(&InputEvent::mouse_down(100.0, 100.0, second), &mut vp) {
            GestureOutcome::DoubleTap { clip, at } => {
                assert_eq!(clip, vp.css_to_clip(100.0, 100.0));
                assert_eq!(at, second);
            }
            other => panic!("expected a double tap, got {other:?}"),
        }
        assert!(!engine.is_dragging());

        // a third tap starts over
        let third = second + Duration::from_millis(100);
        assert_eq!(engine.handle(&InputEvent::mouse_down(100.0, 100.0, third), &mut vp), GestureOutcome::DragStarted);
    }

    #[test]
    fn test_slow_second_tap_is_a_drag() {
        let mut engine = GestureEngine::default();
        let mut vp = viewport(0.0, 0.0, 3.0);
        let t0 = Instant::now();
        engine.handle(&InputEvent::mouse_down(100.0, 100.0, t0), &mut vp);
        engine.handle(&InputEvent::mouse_up(), &mut vp);
        let late = InputEvent::mouse_down(100.0, 100.0, t0 + Duration::from_millis(450));
        assert_eq!(engine.handle(&late, &mut vp), GestureOutcome::DragStarted);
    }

    #[test]
    fn test_resize_uses_device_pixels() {
        let mut engine = GestureEngine::default();
        let mut vp = viewport(0.0, 0.0, 3.0);
        let narrow = vp.bounds();
        let event = InputEvent::Resize {
            css_width: 800.0,
            css_height: 600.0,
            device_pixel_ratio: 2.0,
        };
        assert_eq!(engine.handle(&event, &mut vp), GestureOutcome::Resized);
        assert_eq!(vp.canvas().pixel_width(), 1600.0);
        assert!(vp.bounds().max_lng - vp.bounds().min_lng > narrow.max_lng - narrow.min_lng);
    }

    #[test]
    fn test_switches() {
        let config = GestureConfig {
            dragging: false,
            scroll_wheel_zoom: false,
            ..GestureConfig::default()
        };
        let mut engine = GestureEngine::new(config, BoundaryClamp::default(), 0.0, 22.0);
        let mut vp = viewport(0.0, 0.0, 3.0);
        assert_eq!(engine.handle(&InputEvent::mouse_down(1.0, 1.0, Instant::now()), &mut vp), GestureOutcome::Ignored);
        assert_eq!(engine.handle(&InputEvent::Wheel { x: 1.0, y: 1.0, delta_y: 100.0 }, &mut vp), GestureOutcome::Ignored);
    }
}
