//! Viewport state and the tile-selection/projection/paint pipeline built
//! on top of the `braille`, `label`, `style`, and `tile` modules.

mod renderer;
mod viewport;

pub use renderer::{PlacedFeature, Renderer};
pub use viewport::Viewport;
