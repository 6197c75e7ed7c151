//! Time-driven camera animations.
//!
//! Both animations are plain state machines advanced with the frame
//! timestamp; the map applies what they return to its camera and drops them
//! once they report completion.

use geo::{HaversineDistance, HaversineIntermediate, Point};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    #[default]
    EaseInOut,
}

impl Easing {
    /// Maps progress `t` in `[0, 1]` to eased progress.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

/// Animated zoom started by a double tap.
///
/// Each frame inside the window zooms by `frame_delta / duration`, so the
/// total comes to about one zoom level.
#[derive(Debug, Clone)]
pub struct ZoomAnimation {
    anchor: [f64; 2],
    duration: Duration,
    started: Instant,
    last_frame: Instant,
}

impl ZoomAnimation {
    pub fn new(anchor: [f64; 2], started: Instant, duration_ms: u64) -> Self {
        Self {
            anchor,
            duration: Duration::from_millis(duration_ms.max(1)),
            started,
            last_frame: started,
        }
    }

    /// Clip position the zoom is anchored at.
    pub fn anchor(&self) -> [f64; 2] {
        self.anchor
    }

    /// Zoom increment for the frame at `now`, or `None` once the window has passed.
    pub fn step(&mut self, now: Instant) -> Option<f64> {
        if now.saturating_duration_since(self.started) > self.duration {
            return None;
        }
        let frame = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        Some(frame.as_secs_f64() / self.duration.as_secs_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlyToConfig {
    pub duration_ms: u64,
    pub easing: Easing,
}

impl Default for FlyToConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1500,
            easing: Easing::EaseInOut,
        }
    }
}

/// Great-circle flight between two `(lng, lat)` positions. Zoom is left alone.
#[derive(Debug, Clone)]
pub struct FlyTo {
    from: Point<f64>,
    to: Point<f64>,
    duration: Duration,
    easing: Easing,
    started: Option<Instant>,
}

impl FlyTo {
    pub fn new(from: (f64, f64), to: (f64, f64), config: &FlyToConfig) -> Self {
        Self {
            from: Point::new(from.0, from.1),
            to: Point::new(to.0, to.1),
            duration: Duration::from_millis(config.duration_ms),
            easing: config.easing,
            started: None,
        }
    }

    pub fn target(&self) -> (f64, f64) {
        (self.to.x(), self.to.y())
    }

    /// Position at `now` and whether the flight has landed. The clock starts
    /// on the first call.
    pub fn advance(&mut self, now: Instant) -> ((f64, f64), bool) {
        let started = *self.started.get_or_insert(now);
        let t = if self.duration.is_zero() {
            1.0
        } else {
            now.saturating_duration_since(started).as_secs_f64() / self.duration.as_secs_f64()
        };
        if t >= 1.0 || self.from.haversine_distance(&self.to) < 1e-3 {
            return (self.target(), true);
        }
        let p = self
            .from
            .haversine_intermediate(&self.to, self.easing.apply(t));
        ((p.x(), p.y()), false)
    }
}
