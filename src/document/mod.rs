//! Document loading, mutation, and atomic commit.

mod engine;
mod error;
mod map;

pub use engine::ConfigDocument;
pub use error::{ConfigError, Location};
pub use map::FlatMap;
