//! Web-Mercator conversion between lng/lat degrees and the normalized plane.
//!
//! Two coordinate spaces are used:
//! - *unit* Mercator space, `[0,1]²` with the origin at the north-west corner
//!   (the space tile indices are computed in);
//! - the *plane*, `[-1,1]²` with `y` pointing north, which is what the camera
//!   and every vertex buffer live in.

use crate::core::constants::MAX_LATITUDE;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A point on the normalized Mercator plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanePoint {
    pub x: f64,
    pub y: f64,
}

impl PlanePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Stateless projector. All methods are associated functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector;

impl Projector {
    /// Longitude to unit Mercator x.
    pub fn mercator_x_from_lng(lng: f64) -> f64 {
        (180.0 + lng) / 360.0
    }

    /// Latitude to unit Mercator y (0 at the top).
    pub fn mercator_y_from_lat(lat: f64) -> f64 {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        (180.0 - (180.0 / PI) * (PI / 4.0 + lat * PI / 360.0).tan().ln()) / 360.0
    }

    /// Unit Mercator x to longitude. Not clamped.
    pub fn lng_from_mercator_x(x: f64) -> f64 {
        x * 360.0 - 180.0
    }

    /// Unit Mercator y to latitude. Not clamped.
    pub fn lat_from_mercator_y(y: f64) -> f64 {
        let y2 = 180.0 - y * 360.0;
        360.0 / PI * (y2 * PI / 180.0).exp().atan() - 90.0
    }

    /// Unit Mercator space to the plane.
    pub fn unit_to_plane(ux: f64, uy: f64) -> PlanePoint {
        PlanePoint::new(ux * 2.0 - 1.0, 1.0 - uy * 2.0)
    }

    /// Plane to unit Mercator space.
    pub fn plane_to_unit(point: PlanePoint) -> (f64, f64) {
        ((1.0 + point.x) / 2.0, (1.0 - point.y) / 2.0)
    }

    /// Forward projection. Latitude is clamped to the projection limit.
    pub fn lng_lat_to_plane(lng: f64, lat: f64) -> PlanePoint {
        Self::unit_to_plane(Self::mercator_x_from_lng(lng), Self::mercator_y_from_lat(lat))
    }

    /// Inverse projection, returning `(lng, lat)`.
    pub fn plane_to_lng_lat(point: PlanePoint) -> (f64, f64) {
        let (ux, uy) = Self::plane_to_unit(point);
        (Self::lng_from_mercator_x(ux), Self::lat_from_mercator_y(uy))
    }
}
