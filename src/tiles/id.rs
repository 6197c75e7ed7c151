use crate::{
    core::{
        bounds::BoundingBox,
        constants::{MAX_LATITUDE, MAX_ZOOM},
        projection::{PlanePoint, Projector},
    },
    MapError,
};
use serde::{Deserialize, Serialize};
use std::{f64::consts::PI, fmt, str::FromStr};

/// Slippy tile index. The canonical string key is `"x/y/z"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileId {
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Builds an id from signed indices, rejecting anything outside the pyramid.
    pub fn checked(x: i64, y: i64, z: i64) -> Option<Self> {
        if !(0..=MAX_ZOOM as i64).contains(&z) {
            return None;
        }
        let n = 1i64 << z;
        if (0..n).contains(&x) && (0..n).contains(&y) {
            Some(Self::new(x as u32, y as u32, z as u8))
        } else {
            None
        }
    }

    /// Tile containing a geographic point at zoom `z`. Indices are not clamped.
    pub fn index_of(lng: f64, lat: f64, z: u8) -> (i64, i64) {
        let n = 2f64.powi(z as i32);
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin = (lat * PI / 180.0).sin();
        let x = n * (lng / 360.0 + 0.5);
        let y = n * (0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI);
        (x.floor() as i64, y.floor() as i64)
    }

    pub fn is_valid(&self) -> bool {
        self.z <= MAX_ZOOM && self.x < (1u32 << self.z) && self.y < (1u32 << self.z)
    }

    pub fn parent(&self) -> Option<Self> {
        (self.z > 0).then(|| Self::new(self.x >> 1, self.y >> 1, self.z - 1))
    }

    pub fn children(&self) -> [Self; 4] {
        let (x, y, z) = (self.x * 2, self.y * 2, self.z + 1);
        [
            Self::new(x, y, z),
            Self::new(x + 1, y, z),
            Self::new(x, y + 1, z),
            Self::new(x + 1, y + 1, z),
        ]
    }

    /// Unit Mercator square `(min_x, min_y, max_x, max_y)`, y growing south.
    pub fn unit_bounds(&self) -> (f64, f64, f64, f64) {
        let n = 2f64.powi(self.z as i32);
        (
            self.x as f64 / n,
            self.y as f64 / n,
            (self.x + 1) as f64 / n,
            (self.y + 1) as f64 / n,
        )
    }

    /// Geographic box of the tile (`tileToBBOX`).
    pub fn bbox(&self) -> BoundingBox {
        let n = 2f64.powi(self.z as i32);
        let lng = |x: f64| x / n * 360.0 - 180.0;
        let lat = |y: f64| (PI - 2.0 * PI * y / n).sinh().atan().to_degrees();
        BoundingBox::new(
            lng(self.x as f64),
            lat((self.y + 1) as f64),
            lng((self.x + 1) as f64),
            lat(self.y as f64),
        )
    }

    /// South-west and north-east corners of the tile on the plane.
    pub fn plane_corners(&self) -> (PlanePoint, PlanePoint) {
        let b = self.bbox();
        (
            Projector::lng_lat_to_plane(b.min_lng, b.min_lat),
            Projector::lng_lat_to_plane(b.max_lng, b.max_lat),
        )
    }

    /// Substitutes `{z}`, `{x}` and `{y}` in a URL template.
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.x, self.y, self.z)
    }
}

impl FromStr for TileId {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(MapError::InvalidTile(s.to_string()));
        };
        let parse = |v: &str| {
            v.parse::<i64>()
                .map_err(|_| MapError::InvalidTile(s.to_string()))
        };
        Self::checked(parse(x)?, parse(y)?, parse(z)?)
            .ok_or_else(|| MapError::InvalidTile(s.to_string()))
    }
}
