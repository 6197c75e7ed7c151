//! Drives a map against a recording surface and prints what each frame drew.
//!
//! ```text
//! RUST_LOG=slipmap=debug cargo run --example headless -- https://tile.openstreetmap.org/{z}/{x}/{y}.png
//! ```
//!
//! Without a URL argument only an inline GeoJSON layer is shown.

use slipmap::{layers::GeoJsonSource, prelude::*};

const COUNTRIES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"name": "box"},
     "geometry": {"type": "Polygon",
                  "coordinates": [[[5, 45], [15, 45], [15, 55], [5, 55], [5, 45]]]}}
  ]
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut map = MapBuilder::new()
        .with_center([10.0, 50.0])
        .with_zoom(4.0)
        .with_canvas(1024.0, 768.0, 1.0)
        .with_debug(true)
        .build(RecordingSurface::new())?;

    if let Some(url) = std::env::args().nth(1) {
        map.add_layer(LayerDescriptor::image("raster", url)).await?;
    }
    map.add_layer(LayerDescriptor::geojson(
        "box",
        GeoJsonSource::Inline(GeoJson::from_str(COUNTRIES)?),
    ))
    .await?;

    let start = Instant::now();
    let stats = map.frame(start).await;
    log::info!("first frame: {stats:?}, {} tiles in view", map.tiles_in_view().len());

    // scroll in around the upper-left quarter, then fly to Rome
    map.handle_input(InputEvent::Wheel {
        x: 256.0,
        y: 192.0,
        delta_y: -500.0,
    })
    .await;
    map.fly_to([12.5, 41.9]);

    let mut now = start;
    while map.is_animating() {
        now += Duration::from_millis(16);
        map.frame(now).await;
    }
    let stats = map.frame(now).await;

    let (lng, lat) = map.center();
    log::info!(
        "landed at ({lng:.3}, {lat:.3}) zoom {:.2}; bounds {:?}",
        map.zoom(),
        map.get_bounds().to_array()
    );
    log::info!(
        "last frame: {stats:?} ({} triangle lists, {} quads, {} outlines)",
        map.surface().triangle_calls(),
        map.surface().quad_calls(),
        map.surface().line_loop_calls()
    );
    for event in map.take_events().iter().filter(|e| !matches!(e, MapEvent::ViewChanged { .. })) {
        log::info!("event: {event:?}");
    }
    Ok(())
}
