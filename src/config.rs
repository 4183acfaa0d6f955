//! Immutable configuration record: CLI flags (`clap`) merged over an
//! optional TOML file (`toml` + `dirs`) merged over built-in defaults,
//! with flags taking precedence, then the file, then built-in defaults.

use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-source-layer override (`layers` config key): label margin and
/// whether the layer participates in marker clustering. `cluster` is
/// accepted for forward compatibility with style documents that set it;
/// no clustering pass reads it yet.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LayerOverride {
    pub margin: Option<f64>,
    pub cluster: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct FileConfig {
    language: Option<String>,
    source: Option<String>,
    style_file: Option<String>,
    initial_lat: Option<f64>,
    initial_lon: Option<f64>,
    initial_zoom: Option<f64>,
    max_zoom: Option<f64>,
    zoom_step: Option<f64>,
    use_braille: Option<bool>,
    persist_downloaded_tiles: Option<bool>,
    project_size: Option<f64>,
    label_margin: Option<f64>,
    delimiter: Option<String>,
    poi_marker: Option<String>,
    headless: Option<bool>,
    cache_size: Option<usize>,
    #[serde(default)]
    layers: HashMap<String, LayerOverride>,
}

/// `vtmap` — terminal slippy-map viewer for Mapbox-style vector tiles.
#[derive(Debug, Parser, Default)]
#[command(name = "vtmap", about = "Terminal slippy-map viewer for Mapbox-style vector tiles")]
pub struct Cli {
    /// Path to a TOML config file (default: `~/.config/vtmap/config.toml`).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Label language suffix (`name_<language>`).
    #[arg(long)]
    pub language: Option<String>,

    /// Tile origin: an `http(s)://` base URL or a local `.mbtiles` path.
    #[arg(long)]
    pub source: Option<String>,

    /// Path to a Mapbox-GL-style JSON document.
    #[arg(long)]
    pub style_file: Option<String>,

    #[arg(long)]
    pub initial_lat: Option<f64>,
    #[arg(long)]
    pub initial_lon: Option<f64>,
    #[arg(long)]
    pub initial_zoom: Option<f64>,
    #[arg(long)]
    pub max_zoom: Option<f64>,
    #[arg(long)]
    pub zoom_step: Option<f64>,

    /// Braille glyphs vs ASCII-block fallback.
    #[arg(long)]
    pub use_braille: Option<bool>,

    /// Persist fetched tiles under the OS cache directory.
    #[arg(long)]
    pub persist_downloaded_tiles: bool,

    /// Reference tile size in canvas pixels.
    #[arg(long)]
    pub project_size: Option<f64>,

    /// Default label collision margin, in cell units.
    #[arg(long)]
    pub label_margin: Option<f64>,

    /// Row separator in the emitted frame string.
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Glyph drawn for POI symbols without label text.
    #[arg(long)]
    pub poi_marker: Option<String>,

    /// Disable keyboard/mouse init; print one frame to stdout and exit.
    #[arg(long)]
    pub headless: bool,

    /// Decoded-tile LRU bound.
    #[arg(long)]
    pub cache_size: Option<usize>,
}

/// The merged, immutable configuration every component is constructed
/// from. No component mutates a shared global afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub language: String,
    pub source: String,
    pub style_file: String,
    pub initial_lat: f64,
    pub initial_lon: f64,
    pub initial_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub use_braille: bool,
    pub persist_downloaded_tiles: bool,
    pub project_size: f64,
    pub label_margin: f64,
    pub delimiter: String,
    pub poi_marker: String,
    pub headless: bool,
    pub cache_size: usize,
    pub layers: HashMap<String, LayerOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            source: "https://tile.example.com/data".to_string(),
            style_file: "style.json".to_string(),
            initial_lat: 52.51298,
            initial_lon: 13.42012,
            initial_zoom: 4.0,
            max_zoom: 18.0,
            zoom_step: 0.5,
            use_braille: true,
            persist_downloaded_tiles: false,
            project_size: 256.0,
            label_margin: 2.0,
            delimiter: "\n\r".to_string(),
            poi_marker: "\u{25c9}".to_string(),
            headless: false,
            cache_size: 16,
            layers: HashMap::new(),
        }
    }
}

impl Config {
    /// Merge CLI flags (highest precedence) over an optional config file
    /// over built-in defaults (lowest). A missing or unparsable config
    /// file degrades to defaults rather than failing the whole program.
    pub fn load(cli: Cli) -> Config {
        let mut cfg = Config::default();

        let path = cli
            .config
            .clone()
            .or_else(default_config_path);
        if let Some(path) = path {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<FileConfig>(&text) {
                    Ok(file) => cfg.apply_file(file),
                    Err(e) => tracing::warn!(?path, error = %e, "failed to parse config file, using defaults"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(?path, error = %e, "failed to read config file, using defaults"),
            }
        }

        cfg.apply_cli(cli);
        cfg
    }

    fn apply_file(&mut self, file: FileConfig) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = file.$field {
                    self.$field = v;
                }
            };
        }
        take!(language);
        take!(source);
        take!(style_file);
        take!(initial_lat);
        take!(initial_lon);
        take!(initial_zoom);
        take!(max_zoom);
        take!(zoom_step);
        take!(use_braille);
        take!(persist_downloaded_tiles);
        take!(project_size);
        take!(label_margin);
        take!(delimiter);
        take!(poi_marker);
        take!(headless);
        take!(cache_size);
        for (k, v) in file.layers {
            self.layers.insert(k, v);
        }
    }

    fn apply_cli(&mut self, cli: Cli) {
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = cli.$field {
                    self.$field = v;
                }
            };
        }
        take!(language);
        take!(source);
        take!(style_file);
        take!(initial_lat);
        take!(initial_lon);
        take!(initial_zoom);
        take!(max_zoom);
        take!(zoom_step);
        take!(use_braille);
        take!(project_size);
        take!(label_margin);
        take!(delimiter);
        take!(poi_marker);
        take!(cache_size);
        if cli.persist_downloaded_tiles {
            self.persist_downloaded_tiles = true;
        }
        if cli.headless {
            self.headless = true;
        }
    }

    /// Collision margin for a source layer, honoring its `layers.<name>`
    /// override if one is configured.
    pub fn margin_for(&self, source_layer: &str) -> f64 {
        self.layers
            .get(source_layer)
            .and_then(|o| o.margin)
            .unwrap_or(self.label_margin)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vtmap").join("config.toml"))
}
