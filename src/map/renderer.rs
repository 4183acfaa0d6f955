//! Viewport -> tile selection -> projection -> paint pipeline.
//!
//! `Renderer` owns the `Canvas` and `LabelBuffer`; a `draw` call clears
//! both, selects the tiles intersecting the viewport, requests them from a
//! `TileSource`, and once all have resolved paints every styled layer's
//! features onto the canvas in style-declaration order before returning
//! the serialized frame. The call is atomic: a `draw` already in flight
//! rejects a re-entrant one with `Error::RendererBusy` rather than
//! interleaving with it.

use crate::braille::Canvas;
use crate::error::{Error, TileKey};
use crate::geo;
use crate::label::LabelBuffer;
use crate::style::LayerType;
use crate::tile::{Geometry, TileSource};
use rstar::AABB;
use std::sync::atomic::{AtomicBool, Ordering};

use super::viewport::Viewport;

/// Minimal info about a placed label/marker, recoverable via
/// [`Renderer::features_at`] to answer "what's under the cursor".
#[derive(Clone, Debug)]
pub struct PlacedFeature {
    pub source_layer: String,
    pub label: Option<String>,
}

pub struct Renderer {
    canvas: Canvas,
    labels: LabelBuffer<PlacedFeature>,
    busy: AtomicBool,
    project_size: f64,
    poi_marker: String,
    default_margin: f64,
    layer_margins: std::collections::HashMap<String, f64>,
    use_braille: bool,
}

impl Renderer {
    pub fn new(width: usize, height: usize, project_size: f64, poi_marker: String, default_margin: f64) -> Self {
        Self {
            canvas: Canvas::new(width, height),
            labels: LabelBuffer::new(),
            busy: AtomicBool::new(false),
            project_size,
            poi_marker,
            default_margin,
            layer_margins: std::collections::HashMap::new(),
            use_braille: true,
        }
    }

    /// Per-source-layer label-margin overrides (the `layers.<name>.margin`
    /// config key).
    pub fn set_layer_margin(&mut self, source_layer: impl Into<String>, margin: f64) {
        self.layer_margins.insert(source_layer.into(), margin);
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        let mut canvas = Canvas::new(width, height);
        canvas.set_use_braille(self.use_braille);
        self.canvas = canvas;
    }

    pub fn set_use_braille(&mut self, v: bool) {
        self.use_braille = v;
        self.canvas.set_use_braille(v);
    }

    pub fn set_delimiter(&mut self, d: impl Into<String>) {
        self.canvas.set_delimiter(d);
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn width(&self) -> usize {
        self.canvas.width()
    }

    pub fn height(&self) -> usize {
        self.canvas.height()
    }

    /// All placed label/marker rectangles covering cell-space `(x, y)`.
    pub fn features_at(&self, x: f64, y: f64) -> Vec<&PlacedFeature> {
        self.labels.features_at(x, y)
    }

    /// Render one frame for `viewport` against `source`. Fails with
    /// [`Error::RendererBusy`] if re-entered while a draw is already in
    /// flight; otherwise fails with the first tile fetch/decode error
    /// encountered (the caller should leave the previous frame on screen).
    pub fn draw(&mut self, source: &mut TileSource, viewport: &Viewport) -> Result<String, Error> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(Error::RendererBusy);
        }
        let result = self.draw_inner(source, viewport);
        self.busy.store(false, Ordering::Release);
        result
    }

    fn draw_inner(&mut self, source: &mut TileSource, viewport: &Viewport) -> Result<String, Error> {
        self.canvas.clear();
        self.labels.clear();

        {
            let styler = source.styler();
            if let Some(bg) = styler.layers().iter().find(|l| l.layer_type == LayerType::Background) {
                let (r, g, b) = bg.paint_color("background-color", "#000000");
                self.canvas.set_global_background(geo::nearest_256(r, g, b));
            }
        }

        let z = viewport.zoom.floor();
        let n = 2f64.powi(z as i32);
        let (ctx, cty) = geo::ll2tile(viewport.center_lon, viewport.center_lat, z);
        let tilesize = geo::tilesize_at_zoom(viewport.zoom, self.project_size);
        let half_x = (self.canvas.width() as f64 / 2.0) / tilesize;
        let half_y = (self.canvas.height() as f64 / 2.0) / tilesize;

        let tx_min = (ctx - half_x).floor() as i64;
        let tx_max = (ctx + half_x).floor() as i64;
        let ty_min = (cty - half_y).floor().max(0.0) as i64;
        let ty_max = (cty + half_y).floor().min(n - 1.0) as i64;

        struct Slot {
            key: TileKey,
            tx: i64,
            ty: i64,
        }

        let mut slots = Vec::new();
        if ty_min <= ty_max {
            for tx in tx_min..=tx_max {
                let wrapped_x = tx.rem_euclid(n as i64) as u32;
                for ty in ty_min..=ty_max {
                    slots.push(Slot {
                        key: TileKey { z: z as u8, x: wrapped_x, y: ty as u32 },
                        tx,
                        ty,
                    });
                }
            }
        }

        // All tile fetches resolve (in parallel, for cache misses) before
        // any painting happens, so the canvas is never observed half-drawn.
        let keys: Vec<TileKey> = slots.iter().map(|s| s.key).collect();
        let tiles = source.get_tiles(&keys)?;

        let styler = source.styler();
        for layer in styler.layers() {
            if layer.layer_type == LayerType::Background {
                continue;
            }
            if !layer.in_zoom_range(viewport.zoom) {
                continue;
            }
            let Some(source_layer) = &layer.source_layer else { continue };
            let margin = self
                .layer_margins
                .get(source_layer)
                .copied()
                .unwrap_or(self.default_margin);

            for (slot, tile) in slots.iter().zip(tiles.iter()) {
                let Some(index) = tile.layers.get(source_layer) else { continue };
                let extent = index.extent as f64;

                let vis_min_x = (ctx - half_x).max(slot.tx as f64);
                let vis_max_x = (ctx + half_x).min(slot.tx as f64 + 1.0);
                let vis_min_y = (cty - half_y).max(slot.ty as f64);
                let vis_max_y = (cty + half_y).min(slot.ty as f64 + 1.0);
                if vis_min_x >= vis_max_x || vis_min_y >= vis_max_y {
                    continue;
                }
                let search = AABB::from_corners(
                    [(vis_min_x - slot.tx as f64) * extent, (vis_min_y - slot.ty as f64) * extent],
                    [(vis_max_x - slot.tx as f64) * extent, (vis_max_y - slot.ty as f64) * extent],
                );

                let mut hits: Vec<_> = index.tree.locate_in_envelope_intersecting(&search).collect();
                hits.sort_by_key(|f| f.sort_key);

                let tile_center_x = (ctx - slot.tx as f64) * extent;
                let tile_center_y = (cty - slot.ty as f64) * extent;
                let scale = tilesize / extent;
                let project = |p: (i64, i64)| -> (i64, i64) {
                    let x = (p.0 as f64 - tile_center_x) * scale + self.canvas.width() as f64 / 2.0;
                    let y = (p.1 as f64 - tile_center_y) * scale + self.canvas.height() as f64 / 2.0;
                    (x.round() as i64, y.round() as i64)
                };

                for feature in hits {
                    match (&feature.geometry, layer.layer_type) {
                        (Geometry::Polygon(rings), LayerType::Fill) => {
                            let projected: Vec<Vec<(i64, i64)>> =
                                rings.iter().map(|ring| ring.iter().map(|&p| project(p)).collect()).collect();
                            self.canvas.polygon(&projected, feature.color);
                        }
                        (Geometry::Line(pts), LayerType::Line) => {
                            let projected: Vec<(i64, i64)> = pts.iter().map(|&p| project(p)).collect();
                            self.canvas.polyline(&projected, feature.color, feature.width.max(1.0));
                        }
                        (geometry, LayerType::Symbol) => {
                            let (cx, cy) = project(centroid_of(geometry));
                            let text = feature.label.clone().unwrap_or_else(|| self.poi_marker.clone());
                            let cell_x = cx as f64 / 2.0;
                            let cell_y = cy as f64 / 4.0;
                            let placed = PlacedFeature {
                                source_layer: feature.source_layer.clone(),
                                label: feature.label.clone(),
                            };
                            if self.labels.write_if_possible(&text, cell_x, cell_y, placed, margin) {
                                self.canvas.text(&text, cx, cy, feature.color, true);
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        Ok(self.canvas.frame())
    }
}

/// Centroid approximation used to anchor a symbol label: the mean of a
/// point's coordinate, a line's vertices, or a polygon's outer ring.
fn centroid_of(geom: &Geometry) -> (i64, i64) {
    match geom {
        Geometry::Point(p) => *p,
        Geometry::Line(pts) => mean(pts),
        Geometry::Polygon(rings) => rings.first().map(|r| mean(r)).unwrap_or((0, 0)),
    }
}

fn mean(pts: &[(i64, i64)]) -> (i64, i64) {
    if pts.is_empty() {
        return (0, 0);
    }
    let (sx, sy) = pts.iter().fold((0i64, 0i64), |(ax, ay), &(x, y)| (ax + x, ay + y));
    (sx / pts.len() as i64, sy / pts.len() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Styler;
    use crate::tile::source::TileFetcher;
    use std::collections::HashMap as Map;

    struct EmptyFetcher;
    impl TileFetcher for EmptyFetcher {
        fn fetch(&self, _key: TileKey) -> anyhow::Result<Vec<u8>> {
            // Zero-layer MVT tile: an empty protobuf message decodes fine.
            Ok(Vec::new())
        }
    }

    fn empty_source() -> TileSource {
        let styler = Styler::from_str("{\"layers\": []}").unwrap();
        TileSource::with_fetcher(Box::new(EmptyFetcher), styler, "en".to_string(), 16, false)
    }

    #[test]
    fn draw_rejects_reentrant_call() {
        let mut renderer = Renderer::new(40, 40, 256.0, "\u{25c9}".to_string(), 2.0);
        let mut source = empty_source();
        let viewport = Viewport::new(0.0, 0.0, 2.0, 40, 40, 256.0, 18.0, 0.5);
        renderer.busy.store(true, Ordering::SeqCst);
        let err = renderer.draw(&mut source, &viewport).unwrap_err();
        assert!(matches!(err, Error::RendererBusy));
    }

    #[test]
    fn draw_with_no_layers_produces_a_blank_frame() {
        let mut renderer = Renderer::new(8, 8, 256.0, "\u{25c9}".to_string(), 2.0);
        let mut source = empty_source();
        let viewport = Viewport::new(0.0, 0.0, 2.0, 8, 8, 256.0, 18.0, 0.5);
        let frame = renderer.draw(&mut source, &viewport).unwrap();
        assert!(frame.contains('\u{2800}'));
    }

    #[test]
    fn centroid_of_line_is_the_vertex_mean() {
        let (x, y) = mean(&[(0, 0), (10, 0), (5, 10)]);
        assert_eq!((x, y), (5, 3));
        let _ = Map::<String, f64>::new();
    }
}
