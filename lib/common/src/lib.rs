mod configuration;
pub mod error;
mod pattern;

pub use configuration::{keys, Configuration};
pub use pattern::QuadPattern;
