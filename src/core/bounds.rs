use crate::core::constants::{MAX_LATITUDE, MAX_LONGITUDE};
use serde::{Deserialize, Serialize};

/// Geographic box `[min_lng, min_lat, max_lng, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// The whole projectable world.
    pub fn world() -> Self {
        Self::new(-MAX_LONGITUDE, -MAX_LATITUDE, MAX_LONGITUDE, MAX_LATITUDE)
    }

    /// Clamp every edge to `[-lng_limit, lng_limit] × [-lat_limit, lat_limit]`.
    pub fn clamped(&self, lng_limit: f64, lat_limit: f64) -> Self {
        Self::new(
            self.min_lng.max(-lng_limit),
            self.min_lat.max(-lat_limit),
            self.max_lng.min(lng_limit),
            self.max_lat.min(lat_limit),
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

/// Policy deciding when a camera mutation has run into the world edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BoundaryClamp {
    /// Never roll back.
    Disabled,
    /// Roll back when an edge of the box, clamped to these limits, lands
    /// exactly on a limit.
    Edges { lng: f64, lat: f64 },
}

impl BoundaryClamp {
    /// The inset variant seen in older releases (`±179.5` longitude).
    pub fn legacy_inset() -> Self {
        Self::Edges {
            lng: 179.5,
            lat: MAX_LATITUDE,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Edge-equality test on a box that has not been clamped yet.
    pub fn at_limits(&self, raw: &BoundingBox) -> bool {
        match *self {
            Self::Disabled => false,
            Self::Edges { lng, lat } => {
                let b = raw.clamped(lng, lat);
                b.min_lng == -lng || b.min_lat == -lat || b.max_lng == lng || b.max_lat == lat
            }
        }
    }
}

impl Default for BoundaryClamp {
    fn default() -> Self {
        Self::Edges {
            lng: MAX_LONGITUDE,
            lat: MAX_LATITUDE,
        }
    }
}
