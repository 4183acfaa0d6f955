//! Application state: the config, tile source, renderer, and viewport a
//! frame is drawn from, plus the pan/zoom/drag bookkeeping the terminal
//! driver in `main.rs` feeds from keyboard and mouse events.

use vtmap::config::Config;
use vtmap::map::{PlacedFeature, Renderer, Viewport};
use vtmap::tile::TileSource;

pub struct App {
    pub config: Config,
    pub source: TileSource,
    pub renderer: Renderer,
    pub viewport: Viewport,
    pub should_quit: bool,
    /// Mouse position at the start of a left-button drag.
    last_mouse: Option<(u16, u16)>,
    /// Most recent cursor position, tracked for `featuresAt` queries.
    mouse_pos: Option<(u16, u16)>,
    /// Set when a draw fails; shown in the status bar until the next
    /// successful frame.
    pub notice: Option<String>,
}

impl App {
    pub fn new(config: Config, source: TileSource, width: usize, height: usize) -> Self {
        let mut renderer = Renderer::new(width * 2, height * 4, config.project_size, config.poi_marker.clone(), config.label_margin);
        renderer.set_use_braille(config.use_braille);
        renderer.set_delimiter(config.delimiter.clone());
        for (name, over) in &config.layers {
            if let Some(margin) = over.margin {
                renderer.set_layer_margin(name.clone(), margin);
            }
        }

        let viewport = Viewport::new(
            config.initial_lon,
            config.initial_lat,
            config.initial_zoom,
            width * 2,
            height * 4,
            config.project_size,
            config.max_zoom,
            config.zoom_step,
        );

        Self {
            config,
            source,
            renderer,
            viewport,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            notice: None,
        }
    }

    /// Render the current viewport and return the serialized frame, or
    /// `None` if a draw is already in flight. Fetch/decode failures are
    /// recorded in `notice` and the previous frame should stay on screen.
    pub fn draw(&mut self) -> Option<String> {
        match self.renderer.draw(&mut self.source, &self.viewport) {
            Ok(frame) => {
                self.notice = None;
                Some(frame)
            }
            Err(e) => {
                tracing::warn!(error = %e, "draw failed");
                self.notice = Some(e.to_string());
                None
            }
        }
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.renderer.resize(cols * 2, rows * 4);
        self.viewport.resize(cols * 2, rows * 4);
    }

    pub fn pan(&mut self, dx: i64, dy: i64) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
    }

    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        self.viewport.zoom_in_at(col as f64 * 2.0, row as f64 * 4.0);
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        self.viewport.zoom_out_at(col as f64 * 2.0, row as f64 * 4.0);
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}", self.viewport.zoom)
    }

    pub fn center_coords(&self) -> String {
        format!("{:.4}, {:.4}", self.viewport.center_lat, self.viewport.center_lon)
    }

    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
    }

    pub fn start_drag(&mut self, col: u16, row: u16) {
        self.last_mouse = Some((col, row));
    }

    pub fn handle_drag(&mut self, col: u16, row: u16) {
        if let Some((lx, ly)) = self.last_mouse {
            let dx = (lx as i64 - col as i64) * 2;
            let dy = (ly as i64 - row as i64) * 4;
            self.pan(dx, dy);
        }
        self.last_mouse = Some((col, row));
    }

    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    /// Labels/markers under the current cursor position, in cell space.
    pub fn features_under_cursor(&self) -> Vec<&PlacedFeature> {
        match self.mouse_pos {
            Some((col, row)) => self.renderer.features_at(col as f64, row as f64),
            None => Vec::new(),
        }
    }
}
