//! `vtmap` — a terminal slippy-map viewer for Mapbox-style vector tiles.
//!
//! The rendering pipeline lives here as a library; `src/main.rs` is a thin
//! `crossterm`+`ratatui` driver over it, keeping map-renderer logic
//! separate from the terminal driver.

pub mod braille;
pub mod config;
pub mod error;
pub mod geo;
pub mod label;
pub mod logging;
pub mod map;
pub mod style;
pub mod tile;
pub mod value;
