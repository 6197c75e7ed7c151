pub mod events;
pub mod gestures;

// Re-export the essential types
pub use events::{InputEvent, MapEvent, PointerKind};
pub use gestures::{GestureConfig, GestureEngine, GestureOutcome};
