//! Error kinds for the tile/render pipeline. I/O errors bubble, decode and
//! render failures degrade (skip a feature or a tile), configuration errors
//! fail fast — see the propagation rule this mirrors.

use std::fmt;

/// A `(z, x, y)` tile coordinate, used to annotate fetch/decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.z, self.x, self.y)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The `source` config string matched no supported scheme.
    #[error("unsupported tile source: {0}")]
    SourceConfig(String),

    /// Network, archive, or filesystem failure while fetching tile bytes.
    #[error("failed to fetch tile {key}: {source}")]
    TileFetch {
        key: TileKey,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed protobuf, invalid gzip, or a triangulation failure.
    #[error("failed to decode tile {key}: {source}")]
    TileDecode {
        key: TileKey,
        #[source]
        source: anyhow::Error,
    },

    /// A `Renderer::draw` call arrived while one was already in flight.
    #[error("renderer busy: a draw is already in progress")]
    RendererBusy,
}

pub type Result<T> = std::result::Result<T, Error>;
