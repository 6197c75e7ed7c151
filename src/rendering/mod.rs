pub mod compositor;
pub mod surface;

// Re-export main types
pub use compositor::RenderCompositor;
pub use surface::{DrawCall, RecordingSurface, RenderSurface};
