//! Shared fixtures: an in-memory fetcher that counts requests and encoders
//! for the tile formats it serves.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgba, RgbaImage};
use slipmap::{
    prelude::{CanvasSize, Map, MapConfig, MapOptions, RecordingSurface},
    MapError, Result, TileFetcher,
};
use std::{
    collections::HashMap,
    io::Cursor,
    sync::{Arc, Mutex},
    time::Duration,
};

pub const VECTOR_URL: &str = "mem://vt/{z}/{x}/{y}.pbf";
pub const IMAGE_URL: &str = "mem://img/{z}/{x}/{y}.png";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves vector tiles under `mem://vt/`, PNG tiles under `mem://img/` and
/// registered documents by exact URL. URLs containing `missing` fail.
pub struct MemoryFetcher {
    vector: Vec<u8>,
    png: Vec<u8>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl MemoryFetcher {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            vector: water_tile(),
            png: png_tile(),
            documents: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            delay,
        })
    }

    pub fn serve(&self, url: &str, body: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), body.as_bytes().to_vec());
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Largest number of requests any single URL received.
    pub fn max_calls_per_url(&self) -> usize {
        self.calls.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

#[async_trait]
impl TileFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if url.contains("missing") {
            return Err(MapError::Http {
                status: 404,
                url: url.to_string(),
            });
        }
        if let Some(doc) = self.documents.lock().unwrap().get(url) {
            return Ok(doc.clone());
        }
        if url.starts_with("mem://vt/") {
            Ok(self.vector.clone())
        } else if url.starts_with("mem://img/") {
            Ok(self.png.clone())
        } else {
            Err(MapError::Http {
                status: 404,
                url: url.to_string(),
            })
        }
    }
}

pub fn map_with(
    fetcher: Arc<MemoryFetcher>,
    center: [f64; 2],
    zoom: f64,
    config: MapConfig,
) -> Map<RecordingSurface> {
    let options = MapOptions {
        center,
        zoom,
        ..Default::default()
    };
    Map::with_config(
        RecordingSurface::new(),
        options,
        config,
        fetcher,
        CanvasSize::new(800.0, 600.0),
    )
}

/// Waits until the map has no background jobs left, collecting results.
pub async fn drain_background(map: &mut Map<RecordingSurface>) {
    for _ in 0..500 {
        map.poll_background();
        if map.pending_background_tiles() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("background tiles did not settle");
}

fn varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn field(out: &mut Vec<u8>, number: u64, bytes: &[u8]) {
    varint(out, (number << 3) | 2);
    varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// One-layer vector tile whose `water` layer covers the whole tile.
pub fn water_tile() -> Vec<u8> {
    // MoveTo(0,0) LineTo x3 ClosePath
    let mut packed = Vec::new();
    for v in [
        9,
        zigzag(0),
        zigzag(0),
        (3 << 3) | 2,
        zigzag(4096),
        zigzag(0),
        zigzag(0),
        zigzag(4096),
        zigzag(-4096),
        zigzag(0),
        15,
    ] {
        varint(&mut packed, v);
    }

    let mut feature = Vec::new();
    varint(&mut feature, 3 << 3);
    varint(&mut feature, 3);
    field(&mut feature, 4, &packed);

    let mut layer = Vec::new();
    varint(&mut layer, 15 << 3);
    varint(&mut layer, 2);
    field(&mut layer, 1, b"water");
    field(&mut layer, 2, &feature);
    varint(&mut layer, 5 << 3);
    varint(&mut layer, 4096);

    let mut tile = Vec::new();
    field(&mut tile, 3, &layer);
    tile
}

/// 4x4 PNG, opaque blue.
pub fn png_tile() -> Vec<u8> {
    let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png)
        .expect("encode png");
    out.into_inner()
}
