use crate::tiles::id::TileId;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Device a pointer event came from. Double-tap timing is tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerKind {
    Mouse,
    Touch,
}

/// Input forwarded by the embedder. Positions are CSS pixels relative to the
/// canvas origin.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerDown {
        x: f64,
        y: f64,
        kind: PointerKind,
        timestamp: Instant,
    },
    PointerMove {
        x: f64,
        y: f64,
        kind: PointerKind,
    },
    PointerUp {
        kind: PointerKind,
    },
    Wheel {
        x: f64,
        y: f64,
        delta_y: f64,
    },
    Resize {
        css_width: f64,
        css_height: f64,
        device_pixel_ratio: f64,
    },
}

impl InputEvent {
    pub fn mouse_down(x: f64, y: f64, timestamp: Instant) -> Self {
        InputEvent::PointerDown {
            x,
            y,
            kind: PointerKind::Mouse,
            timestamp,
        }
    }

    pub fn mouse_move(x: f64, y: f64) -> Self {
        InputEvent::PointerMove {
            x,
            y,
            kind: PointerKind::Mouse,
        }
    }

    pub fn mouse_up() -> Self {
        InputEvent::PointerUp {
            kind: PointerKind::Mouse,
        }
    }
}

/// Notifications queued by the map for the embedder
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Camera moved or zoomed
    ViewChanged { center: (f64, f64), zoom: f64 },
    LayerAdded { layer_id: String },
    LayerRemoved { layer_id: String },
    /// A tile settled in the failed state
    TileFailed { layer_id: String, tile: TileId },
}
