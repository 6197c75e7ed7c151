//! Mapbox Vector Tile decoding.
//!
//! Only what the renderer needs is kept: layer names, extents and feature
//! geometries. Property tables are skipped. Geometry follows the MVT command
//! encoding (`MoveTo`, `LineTo`, `ClosePath` with zigzag deltas).

use crate::{tiles::id::TileId, MapError};
use anyhow::{bail, ensure, Context, Result};
use std::f64::consts::PI;

/// Minimal protobuf reader over a byte slice.
pub struct PbfReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PbfReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn has_remaining(&self) -> bool {
        self.pos < self.data.len()
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let byte = *self
                .data
                .get(self.pos)
                .context("Unexpected end of data while reading varint")?;
            self.pos += 1;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            ensure!(shift < 64, "Varint is longer than 10 bytes");
        }
    }

    /// Field number and wire type.
    pub fn read_pbf_key(&mut self) -> Result<(u32, u8)> {
        let key = self.read_varint()?;
        Ok(((key >> 3) as u32, (key & 0x7) as u8))
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_varint()? as usize;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .context("Length-delimited field runs past the end of data")?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let bytes = self.read_bytes()?;
        Ok(std::str::from_utf8(bytes)
            .context("String field is not valid UTF-8")?
            .to_string())
    }

    pub fn read_packed_u32(&mut self) -> Result<Vec<u32>> {
        let mut inner = PbfReader::new(self.read_bytes()?);
        let mut values = Vec::new();
        while inner.has_remaining() {
            values.push(inner.read_varint()? as u32);
        }
        Ok(values)
    }

    pub fn skip(&mut self, wire_type: u8) -> Result<()> {
        match wire_type {
            0 => {
                self.read_varint()?;
            }
            1 => self.advance(8)?,
            2 => {
                self.read_bytes()?;
            }
            5 => self.advance(4)?,
            w => bail!("Unsupported wire type {w}"),
        }
        Ok(())
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        ensure!(self.pos + n <= self.data.len(), "Fixed-width field runs past the end of data");
        self.pos += n;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomType {
    Unknown,
    Point,
    LineString,
    Polygon,
}

impl From<u64> for GeomType {
    fn from(value: u64) -> Self {
        match value {
            1 => GeomType::Point,
            2 => GeomType::LineString,
            3 => GeomType::Polygon,
            _ => GeomType::Unknown,
        }
    }
}

/// Ring or line in tile extent coordinates.
pub type TileLine = Vec<[f64; 2]>;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorTileFeature {
    pub id: Option<u64>,
    pub geom_type: GeomType,
    pub geometry: Vec<u32>,
}

impl VectorTileFeature {
    fn read(reader: &mut PbfReader<'_>) -> Result<Self> {
        let mut feature = VectorTileFeature {
            id: None,
            geom_type: GeomType::Unknown,
            geometry: Vec::new(),
        };
        while reader.has_remaining() {
            match reader.read_pbf_key().context("Failed to read PBF key")? {
                (1, 0) => feature.id = Some(reader.read_varint().context("Failed to read feature ID")?),
                (3, 0) => {
                    feature.geom_type = GeomType::from(
                        reader
                            .read_varint()
                            .context("Failed to read geometry type")?,
                    )
                }
                (4, 2) => {
                    feature.geometry = reader
                        .read_packed_u32()
                        .context("Failed to read geometry data")?
                }
                (_, w) => reader.skip(w)?,
            }
        }
        Ok(feature)
    }

    /// Decodes the command stream into lines. Closed rings repeat their first point.
    pub fn lines(&self) -> Result<Vec<TileLine>> {
        let mut lines = Vec::new();
        let mut line: TileLine = Vec::new();
        let (mut x, mut y) = (0i64, 0i64);
        let mut values = self.geometry.iter().copied();

        while let Some(value) = values.next() {
            let command = value & 0x7;
            let count = value >> 3;
            match command {
                1 | 2 => {
                    for _ in 0..count {
                        if command == 1 && !line.is_empty() {
                            lines.push(std::mem::take(&mut line));
                        }
                        let dx = values.next().context("Truncated x coordinate")?;
                        let dy = values.next().context("Truncated y coordinate")?;
                        x += zigzag(dx);
                        y += zigzag(dy);
                        line.push([x as f64, y as f64]);
                    }
                }
                7 => {
                    ensure!(!line.is_empty(), "ClosePath command found on an empty linestring");
                    line.push(line[0]);
                }
                _ => bail!("Unknown command {command}"),
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Groups rings into polygons: a positive-area ring opens a polygon,
    /// negative-area rings are its holes.
    pub fn polygons(&self) -> Result<Vec<Vec<TileLine>>> {
        ensure!(self.geom_type == GeomType::Polygon, "Feature is not a polygon");
        let mut polygons = Vec::new();
        let mut current: Vec<TileLine> = Vec::new();
        for ring in self.lines()? {
            if ring.len() < 4 {
                log::trace!("skipping ring with {} points", ring.len());
                continue;
            }
            let area = ring_area(&ring);
            if area > 1e-14 {
                if !current.is_empty() {
                    polygons.push(std::mem::take(&mut current));
                }
                current.push(ring);
            } else if area < -1e-14 {
                if current.is_empty() {
                    log::trace!("hole without an outer ring");
                } else {
                    current.push(ring);
                }
            }
        }
        if !current.is_empty() {
            polygons.push(current);
        }
        Ok(polygons)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorTileLayer {
    pub name: String,
    pub extent: u32,
    pub version: u32,
    pub features: Vec<VectorTileFeature>,
}

impl VectorTileLayer {
    fn read(reader: &mut PbfReader<'_>) -> Result<Self> {
        let mut layer = VectorTileLayer {
            name: String::new(),
            extent: 4096,
            version: 1,
            features: Vec::new(),
        };
        while reader.has_remaining() {
            match reader.read_pbf_key().context("Failed to read PBF key")? {
                (1, 2) => layer.name = reader.read_string().context("Failed to read layer name")?,
                (2, 2) => {
                    let mut sub = PbfReader::new(reader.read_bytes()?);
                    layer.features.push(
                        VectorTileFeature::read(&mut sub).context("Failed to read feature")?,
                    );
                }
                (5, 0) => layer.extent = reader.read_varint().context("Failed to read extent")? as u32,
                (15, 0) => layer.version = reader.read_varint().context("Failed to read version")? as u32,
                (_, w) => reader.skip(w)?,
            }
        }
        ensure!(layer.extent > 0, "Layer '{}' has a zero extent", layer.name);
        Ok(layer)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorTile {
    pub layers: Vec<VectorTileLayer>,
}

impl VectorTile {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = PbfReader::new(data);
        let mut tile = VectorTile::default();
        while reader.has_remaining() {
            match reader.read_pbf_key().context("Failed to read PBF key")? {
                (3, 2) => {
                    let mut sub = PbfReader::new(reader.read_bytes()?);
                    tile.layers
                        .push(VectorTileLayer::read(&mut sub).context("Failed to read layer")?);
                }
                (_, w) => reader.skip(w)?,
            }
        }
        Ok(tile)
    }

    /// Crate-level entry point.
    pub fn decode(data: &[u8]) -> crate::Result<Self> {
        Self::read(data).map_err(|e| MapError::Decode(format!("{e:#}")))
    }

    pub fn layer(&self, name: &str) -> Option<&VectorTileLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

fn zigzag(v: u32) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Signed area, positive for rings that are clockwise on screen (y down).
pub fn ring_area(ring: &[[f64; 2]]) -> f64 {
    let Some(mut p2) = ring.last() else {
        return 0.0;
    };
    let mut sum = 0.0;
    for p1 in ring {
        sum += (p2[0] - p1[0]) * (p1[1] + p2[1]);
        p2 = p1;
    }
    sum
}

/// Tile extent coordinates to `(lng, lat)`.
pub fn tile_point_to_lng_lat(point: [f64; 2], extent: u32, tile: &TileId) -> (f64, f64) {
    let extent = extent as f64;
    let size = extent * 2f64.powi(tile.z as i32);
    let x0 = extent * tile.x as f64;
    let y0 = extent * tile.y as f64;
    let lng = (point[0] + x0) * 360.0 / size - 180.0;
    let y2 = 180.0 - (point[1] + y0) * 360.0 / size;
    let lat = 360.0 / PI * (y2 * PI / 180.0).exp().atan() - 90.0;
    (lng, lat)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_varint() {
        let mut buf = Vec::new();
        varint(&mut buf, 300);
        varint(&mut buf, 3);
        let mut reader = PbfReader::new(&buf);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.read_varint().unwrap(), 3);
        assert!(!reader.has_remaining());
    }

    #[test]
    fn test_decode_sample_tile() {
        let tile = VectorTile::read(&sample_tile()).unwrap();
        let names: Vec<&str> = tile.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["water", "building", "roads"]);

        let water = tile.layer("water").unwrap();
        assert_eq!(water.extent, 4096);
        assert_eq!(water.version, 2);
        let polygons = water.features[0].polygons().unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0][0].len(), 5);
        assert_eq!(polygons[0][0][2], [4096.0, 4096.0]);
    }

    #[test]
    fn test_holes_are_grouped() {
        let tile = VectorTile::read(&sample_tile()).unwrap();
        let building = tile.layer("building").unwrap();
        let polygons = building.features[0].polygons().unwrap();
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].len(), 2);
    }

    #[test]
    fn test_line_feature() {
        let tile = VectorTile::read(&sample_tile()).unwrap();
        let roads = tile.layer("roads").unwrap();
        assert_eq!(roads.features[0].geom_type, GeomType::LineString);
        assert!(roads.features[0].polygons().is_err());
        assert_eq!(roads.features[0].lines().unwrap()[0].len(), 2);
    }

    #[test]
    fn test_truncated_data_is_an_error() {
        let bytes = sample_tile();
        let err = VectorTile::decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, MapError::Decode(_)));
    }

    #[test]
    fn test_tile_point_to_lng_lat() {
        let tile = TileId::new(0, 0, 0);
        let (lng, lat) = tile_point_to_lng_lat([2048.0, 2048.0], 4096, &tile);
        assert_abs_diff_eq!(lng, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-9);

        let (lng, _) = tile_point_to_lng_lat([0.0, 0.0], 4096, &TileId::new(1, 0, 1));
        assert_abs_diff_eq!(lng, 0.0, epsilon = 1e-9);
    }
}
