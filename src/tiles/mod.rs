pub mod cache;
pub mod fetch;
pub mod id;
pub mod visibility;
pub mod worker;

// Re-exports for convenience
pub use cache::{TileCache, TileState};
pub use fetch::{HttpFetcher, TileFetcher};
pub use id::TileId;
pub use visibility::{TileVisibilitySolver, VisibleTiles};
pub use worker::{TileJob, TileJobResult, TileWorkerPool};
