pub mod engine;
pub mod review;

pub use engine::*;
pub use review::*;
