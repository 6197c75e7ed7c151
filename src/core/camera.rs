use crate::core::{
    constants::{MAX_ZOOM, MIN_ZOOM},
    projection::{PlanePoint, Projector},
};
use serde::{Deserialize, Serialize};

/// View state: position on the Mercator plane and continuous zoom.
///
/// The camera does nothing on its own. Whoever mutates it is responsible for
/// asking the [`Viewport`](crate::core::viewport::Viewport) to recompute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Camera {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z: Self::clamp_zoom(z),
        }
    }

    /// Camera centred on a geographic position.
    pub fn from_lng_lat(lng: f64, lat: f64, zoom: f64) -> Self {
        let p = Projector::lng_lat_to_plane(lng, lat);
        Self::new(p.x, p.y, zoom)
    }

    pub fn clamp_zoom(z: f64) -> f64 {
        z.clamp(MIN_ZOOM, MAX_ZOOM as f64)
    }

    pub fn position(&self) -> PlanePoint {
        PlanePoint::new(self.x, self.y)
    }

    /// Centre as `(lng, lat)`.
    pub fn center(&self) -> (f64, f64) {
        Projector::plane_to_lng_lat(self.position())
    }

    /// Integer tile level for this zoom.
    pub fn tile_zoom(&self) -> u8 {
        (self.z.trunc().max(0.0) as u8).min(MAX_ZOOM)
    }

    pub fn is_valid(&self) -> bool {
        (-1.0..=1.0).contains(&self.x)
            && (-1.0..=1.0).contains(&self.y)
            && (MIN_ZOOM..=MAX_ZOOM as f64).contains(&self.z)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}
