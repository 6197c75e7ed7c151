pub mod bounds;
pub mod builder;
pub mod camera;
pub mod config;
pub mod constants;
pub mod map;
pub mod projection;
pub mod viewport;
