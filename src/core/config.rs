//! Configuration for the map facade and its engine tunables
//!
//! [`MapOptions`] mirrors what an embedder passes at construction time.
//! [`MapConfig`] groups the knobs of the individual subsystems and offers a
//! few presets; every field has a default so partial JSON documents work.

use crate::{
    animation::transitions::{Easing, FlyToConfig},
    core::{
        bounds::BoundaryClamp,
        constants::{MAX_ZOOM, MIN_ZOOM, TILE_BUFFER, TILE_SIZE},
    },
    input::gestures::GestureConfig,
    tiles::{fetch::HttpConfig, worker::WorkerPoolConfig},
    MapError,
};
use serde::{Deserialize, Serialize};

/// Construction options of a [`Map`](crate::core::map::Map).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// `[lng, lat]`
    pub center: [f64; 2],
    pub zoom: f64,
    /// Reserved, not used by the view math.
    pub bearing: f64,
    /// Reserved, not used by the view math.
    pub pitch: f64,
    pub debug: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            zoom: 1.0,
            bearing: 0.0,
            pitch: 0.0,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub tile_size: u32,
    pub tile_buffer: u32,
    pub min_zoom: f64,
    pub max_zoom: u8,
    pub boundary_clamp: BoundaryClamp,
    pub gestures: GestureConfig,
    pub fly_to: FlyToConfig,
    pub workers: WorkerPoolConfig,
    pub http: HttpConfig,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            tile_buffer: TILE_BUFFER,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            boundary_clamp: BoundaryClamp::default(),
            gestures: GestureConfig::default(),
            fly_to: FlyToConfig::default(),
            workers: WorkerPoolConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Unified configuration presets for MapConfig
impl MapConfig {
    pub fn low_resource() -> Self {
        Self {
            tile_buffer: 0,
            fly_to: FlyToConfig {
                duration_ms: 800,
                easing: Easing::Linear,
            },
            workers: WorkerPoolConfig::low_resource(),
            ..Default::default()
        }
    }

    pub fn for_testing() -> Self {
        Self {
            workers: WorkerPoolConfig::for_testing(),
            http: HttpConfig {
                timeout_ms: 2_000,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parses a JSON document; missing fields fall back to defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rejects zoom limits outside `0 <= min_zoom <= max_zoom <= 22`.
    pub fn validate(&self) -> crate::Result<()> {
        if !(MIN_ZOOM..=MAX_ZOOM as f64).contains(&self.min_zoom) || self.max_zoom > MAX_ZOOM {
            return Err(MapError::Validation(format!(
                "zoom limits must lie in [{MIN_ZOOM}, {MAX_ZOOM}], got [{}, {}]",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.min_zoom > self.max_zoom as f64 {
            return Err(MapError::Validation(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }

    /// Effective `(min, max)` zoom, forced into `[0, 22]` with `min <= max`.
    pub fn zoom_limits(&self) -> (f64, f64) {
        let max = self.max_zoom.min(MAX_ZOOM) as f64;
        let min = if self.min_zoom.is_nan() {
            MIN_ZOOM
        } else {
            self.min_zoom.clamp(MIN_ZOOM, max)
        };
        (min, max)
    }

    /// Same configuration with its zoom limits forced into range.
    pub fn normalized(mut self) -> Self {
        let (min, max) = self.zoom_limits();
        self.min_zoom = min;
        self.max_zoom = max as u8;
        self
    }

    /// Clamps a zoom to this configuration's range.
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        let (min, max) = self.zoom_limits();
        zoom.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.tile_buffer, 1);
        assert_eq!(config.max_zoom, 22);
        assert!(config.boundary_clamp.is_enabled());
    }

    #[test]
    fn test_partial_json() {
        let config = MapConfig::from_json(
            r#"{"tile_buffer": 2, "boundary_clamp": {"mode": "disabled"}}"#,
        )
        .unwrap();
        assert_eq!(config.tile_buffer, 2);
        assert_eq!(config.boundary_clamp, BoundaryClamp::Disabled);
        assert_eq!(config.gestures, GestureConfig::default());
    }

    #[test]
    fn test_map_options_defaults() {
        let options: MapOptions = serde_json::from_str(r#"{"center": [120, 30]}"#).unwrap();
        assert_eq!(options.center, [120.0, 30.0]);
        assert_eq!(options.zoom, 1.0);
        assert!(!options.debug);
    }

    #[test]
    fn test_presets_differ() {
        assert_eq!(MapConfig::low_resource().tile_buffer, 0);
        assert!(
            MapConfig::for_testing().workers.max_concurrent
                < MapConfig::default().workers.max_concurrent
        );
    }

    #[test]
    fn test_zoom_limit_validation() {
        assert!(MapConfig::default().validate().is_ok());
        let inverted = MapConfig {
            min_zoom: 10.0,
            max_zoom: 5,
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(MapError::Validation(_))));
        let too_deep = MapConfig {
            max_zoom: 30,
            ..Default::default()
        };
        assert!(too_deep.validate().is_err());
        let negative = MapConfig {
            min_zoom: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_normalized_limits_never_panic() {
        let inverted = MapConfig {
            min_zoom: 10.0,
            max_zoom: 5,
            ..Default::default()
        };
        assert_eq!(inverted.zoom_limits(), (5.0, 5.0));
        assert_eq!(inverted.clamp_zoom(12.0), 5.0);

        let too_deep = MapConfig {
            max_zoom: 70,
            ..Default::default()
        }
        .normalized();
        assert_eq!(too_deep.max_zoom, 22);
        assert!(too_deep.validate().is_ok());
        assert_eq!(too_deep.clamp_zoom(70.0), 22.0);
    }
}
