pub mod transitions;

pub use transitions::{Easing, FlyTo, FlyToConfig, ZoomAnimation};
