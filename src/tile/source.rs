//! Bounded, FIFO-evicted cache of decoded tiles, plugged into a byte
//! fetcher (HTTP, local archive, or anything else implementing
//! [`TileFetcher`]).

use super::Tile;
use crate::error::{Error, TileKey};
use crate::style::Styler;
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

/// Abstracts the "get me the raw bytes for this tile" step so `TileSource`
/// doesn't care whether they came over HTTP, out of an `.mbtiles` archive,
/// or a test double.
pub trait TileFetcher: Send + Sync {
    fn fetch(&self, key: TileKey) -> anyhow::Result<Vec<u8>>;
}

#[cfg(feature = "http")]
pub struct HttpFetcher {
    base_url: String,
    agent: ureq::Agent,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::Agent::new(),
        }
    }
}

#[cfg(feature = "http")]
impl TileFetcher for HttpFetcher {
    fn fetch(&self, key: TileKey) -> anyhow::Result<Vec<u8>> {
        let url = format!("{}/{}/{}/{}.pbf", self.base_url.trim_end_matches('/'), key.z, key.x, key.y);
        let response = self.agent.get(&url).call()?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut response.into_reader(), &mut buf)?;
        Ok(buf)
    }
}

#[cfg(feature = "mbtiles")]
pub struct MbtilesFetcher {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

#[cfg(feature = "mbtiles")]
impl MbtilesFetcher {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = rusqlite::Connection::open(path)?;
        Ok(Self { conn: std::sync::Mutex::new(conn) })
    }
}

#[cfg(feature = "mbtiles")]
impl TileFetcher for MbtilesFetcher {
    fn fetch(&self, key: TileKey) -> anyhow::Result<Vec<u8>> {
        // mbtiles stores tile rows with a TMS-flipped Y axis.
        let flipped_y = (1u32 << key.z) - 1 - key.y;
        let conn = self.conn.lock().expect("mbtiles connection poisoned");
        let bytes: Vec<u8> = conn.query_row(
            "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
            rusqlite::params![key.z, key.x, flipped_y],
            |row| row.get(0),
        )?;
        Ok(bytes)
    }
}

/// Construct the fetcher implied by a `source` config string: `http`-prefixed
/// for HTTP, `.mbtiles`-suffixed for a local archive, anything else fails.
pub fn fetcher_for(source: &str) -> Result<Box<dyn TileFetcher>, Error> {
    if source.starts_with("http") {
        #[cfg(feature = "http")]
        {
            return Ok(Box::new(HttpFetcher::new(source)));
        }
        #[cfg(not(feature = "http"))]
        {
            return Err(Error::SourceConfig(format!("http source given but the `http` feature is disabled: {source}")));
        }
    }
    if source.ends_with(".mbtiles") {
        #[cfg(feature = "mbtiles")]
        {
            return MbtilesFetcher::open(source)
                .map(|f| Box::new(f) as Box<dyn TileFetcher>)
                .map_err(|e| Error::SourceConfig(format!("could not open {source}: {e}")));
        }
        #[cfg(not(feature = "mbtiles"))]
        {
            return Err(Error::SourceConfig(format!("mbtiles source given but the `mbtiles` feature is disabled: {source}")));
        }
    }
    Err(Error::SourceConfig(format!("unsupported tile source scheme: {source}")))
}

/// A bounded cache of decoded [`Tile`]s, evicted FIFO by insertion order
/// (an explicit queue + map, never index-as-key splicing).
pub struct TileSource {
    fetcher: Box<dyn TileFetcher>,
    styler: Styler,
    language: String,
    cache_size: usize,
    persist: bool,
    cache_dir: Option<PathBuf>,
    order: VecDeque<TileKey>,
    tiles: HashMap<TileKey, std::sync::Arc<Tile>>,
}

impl TileSource {
    pub fn new(source: &str, styler: Styler, language: String, cache_size: usize, persist: bool) -> Result<Self, Error> {
        let fetcher = fetcher_for(source)?;
        let cache_dir = persist.then(|| dirs::cache_dir().map(|d| d.join("mapscii"))).flatten();
        Ok(Self {
            fetcher,
            styler,
            language,
            cache_size,
            persist,
            cache_dir,
            order: VecDeque::new(),
            tiles: HashMap::new(),
        })
    }

    pub fn styler(&self) -> &Styler {
        &self.styler
    }

    /// Construct a `TileSource` around an arbitrary fetcher, bypassing the
    /// `source`-string scheme dispatch. Useful for embedding a custom origin
    /// (in-memory fixture, alternate archive format) as well as for tests
    /// that need a `TileSource` without a real HTTP/mbtiles origin.
    pub fn with_fetcher(fetcher: Box<dyn TileFetcher>, styler: Styler, language: String, cache_size: usize, persist: bool) -> Self {
        Self {
            fetcher,
            styler,
            language,
            cache_size,
            persist,
            cache_dir: None,
            order: VecDeque::new(),
            tiles: HashMap::new(),
        }
    }

    /// Fetch-or-return-cached the tile at `key`. On a cache miss, evicts
    /// the oldest entries until under `cache_size`, fetches bytes (trying
    /// the on-disk persistence path first when enabled), decodes, and
    /// inserts.
    pub fn get_tile(&mut self, key: TileKey) -> Result<std::sync::Arc<Tile>, Error> {
        if let Some(tile) = self.tiles.get(&key) {
            return Ok(tile.clone());
        }

        while self.tiles.len() >= self.cache_size {
            if let Some(oldest) = self.order.pop_front() {
                self.tiles.remove(&oldest);
            } else {
                break;
            }
        }

        let bytes = self.load_bytes(key)?;
        let tile = std::sync::Arc::new(Tile::decode(&bytes, &self.styler, key, &self.language)?);

        self.order.push_back(key);
        self.tiles.insert(key, tile.clone());
        Ok(tile)
    }

    /// Resolve every key in `keys`, fetching cache misses' bytes in
    /// parallel (network/disk latency dominates over decode cost) before
    /// decoding and inserting them in the caller's order. Returns the
    /// first fetch/decode error encountered, if any.
    pub fn get_tiles(&mut self, keys: &[TileKey]) -> Result<Vec<std::sync::Arc<Tile>>, Error> {
        let misses: Vec<TileKey> = keys.iter().copied().filter(|k| !self.tiles.contains_key(k)).collect();

        let fetched: Vec<(TileKey, Result<Vec<u8>, Error>)> =
            misses.par_iter().map(|&key| (key, self.load_bytes(key))).collect();

        for (key, bytes) in fetched {
            let bytes = bytes?;
            let tile = std::sync::Arc::new(Tile::decode(&bytes, &self.styler, key, &self.language)?);
            while self.tiles.len() >= self.cache_size {
                if let Some(oldest) = self.order.pop_front() {
                    self.tiles.remove(&oldest);
                } else {
                    break;
                }
            }
            self.order.push_back(key);
            self.tiles.insert(key, tile);
        }

        // A cache smaller than the visible tile count can evict a tile this
        // same batch just inserted; get_tile's fetch-or-cached path covers
        // that rare case with a serial re-fetch instead of panicking.
        keys.iter().map(|&k| self.get_tile(k)).collect()
    }

    fn load_bytes(&self, key: TileKey) -> Result<Vec<u8>, Error> {
        if let Some(dir) = &self.cache_dir {
            let path = dir.join(key.z.to_string()).join(format!("{}-{}.pbf", key.x, key.y));
            if let Ok(bytes) = std::fs::read(&path) {
                return Ok(bytes);
            }
        }

        let bytes = self
            .fetcher
            .fetch(key)
            .map_err(|source| Error::TileFetch { key, source })?;

        if self.persist {
            if let Some(dir) = &self.cache_dir {
                let dir_path = dir.join(key.z.to_string());
                // Persistence is best-effort: a write failure silently
                // disables it for this tile, it never surfaces as an error.
                if std::fs::create_dir_all(&dir_path).is_ok() {
                    let _ = std::fs::write(dir_path.join(format!("{}-{}.pbf", key.x, key.y)), &bytes);
                }
            }
        }

        Ok(bytes)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFetcher(Vec<u8>);
    impl TileFetcher for FixedFetcher {
        fn fetch(&self, _key: TileKey) -> anyhow::Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn empty_styler() -> Styler {
        Styler::from_str("{\"layers\": []}").unwrap()
    }

    #[test]
    fn unsupported_source_scheme_fails_fast() {
        let err = fetcher_for("ftp://nope");
        assert!(err.is_err());
    }

    #[test]
    fn fifo_eviction_drops_oldest_first() {
        let mut source = TileSource {
            fetcher: Box::new(FixedFetcher(Vec::new())),
            styler: empty_styler(),
            language: "en".into(),
            cache_size: 2,
            persist: false,
            cache_dir: None,
            order: VecDeque::new(),
            tiles: HashMap::new(),
        };

        for x in 0..3 {
            let _ = source.get_tile(TileKey { z: 1, x, y: 0 });
        }

        assert_eq!(source.len(), 2);
        assert!(!source.tiles.contains_key(&TileKey { z: 1, x: 0, y: 0 }));
        assert!(source.tiles.contains_key(&TileKey { z: 1, x: 2, y: 0 }));
    }

    #[test]
    fn repeated_fetch_of_same_key_hits_cache() {
        let mut source = TileSource {
            fetcher: Box::new(FixedFetcher(Vec::new())),
            styler: empty_styler(),
            language: "en".into(),
            cache_size: 16,
            persist: false,
            cache_dir: None,
            order: VecDeque::new(),
            tiles: HashMap::new(),
        };
        let key = TileKey { z: 0, x: 0, y: 0 };
        let _ = source.get_tile(key);
        let _ = source.get_tile(key);
        assert_eq!(source.len(), 1);
        assert_eq!(source.order.len(), 1);
    }

    #[test]
    fn persisted_tile_is_read_back_from_disk_without_refetching() {
        let dir = tempfile::tempdir().unwrap();
        let key = TileKey { z: 3, x: 1, y: 2 };

        struct CountingFetcher(std::sync::atomic::AtomicUsize);
        impl TileFetcher for CountingFetcher {
            fn fetch(&self, _key: TileKey) -> anyhow::Result<Vec<u8>> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Vec::new())
            }
        }

        let mut writer = TileSource {
            fetcher: Box::new(CountingFetcher(std::sync::atomic::AtomicUsize::new(0))),
            styler: empty_styler(),
            language: "en".into(),
            cache_size: 16,
            persist: true,
            cache_dir: Some(dir.path().to_path_buf()),
            order: VecDeque::new(),
            tiles: HashMap::new(),
        };
        writer.get_tile(key).unwrap();

        let persisted_path = dir.path().join(key.z.to_string()).join(format!("{}-{}.pbf", key.x, key.y));
        assert!(persisted_path.exists(), "persist=true should write the tile bytes to disk");

        let fetch_count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        struct FailingFetcher(std::sync::Arc<std::sync::atomic::AtomicUsize>);
        impl TileFetcher for FailingFetcher {
            fn fetch(&self, _key: TileKey) -> anyhow::Result<Vec<u8>> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                anyhow::bail!("should not be called: the tile was already persisted to disk")
            }
        }

        let mut reader = TileSource {
            fetcher: Box::new(FailingFetcher(fetch_count.clone())),
            styler: empty_styler(),
            language: "en".into(),
            cache_size: 16,
            persist: true,
            cache_dir: Some(dir.path().to_path_buf()),
            order: VecDeque::new(),
            tiles: HashMap::new(),
        };
        reader.get_tile(key).unwrap();
        assert_eq!(fetch_count.load(std::sync::atomic::Ordering::SeqCst), 0, "load_bytes should prefer the persisted file over the fetcher");
    }
}
