//! Vector-tile decode: protobuf parsing, per-feature styling, and the
//! per-layer R-tree a `Renderer` queries against the viewport.

mod feature;
mod geometry;
pub mod source;

pub use feature::{Feature, Geometry};
pub use source::TileSource;

use crate::error::{Error, TileKey};
use crate::style::{LayerType, Styler};
use crate::value::{Properties, Value};
use rstar::RTree;
use std::collections::HashMap;
use std::io::Read;

mod proto {
    #![allow(clippy::all)]
    include!(concat!(env!("OUT_DIR"), "/vector_tile.rs"));
}

/// R-tree node parameters tuned for the typical feature count of one
/// vector-tile layer: a max node size of ~18 per the layout guidance.
struct TileRtreeParams;

impl rstar::RTreeParams for TileRtreeParams {
    const MIN_SIZE: usize = 6;
    const MAX_SIZE: usize = 18;
    const REINSERTION_COUNT: usize = 2;
    type DefaultInsertionStrategy = rstar::RStarInsertionStrategy;
}

pub struct LayerIndex {
    pub extent: u32,
    pub tree: RTree<Feature, TileRtreeParams>,
}

/// A decoded, styled tile. Immutable once built; dropped wholesale on
/// cache eviction.
pub struct Tile {
    pub extent: u32,
    pub layers: HashMap<String, LayerIndex>,
}

impl Tile {
    /// Decode `bytes` (optionally gzip-wrapped) as an MVT v2 tile, apply
    /// `styler` to every feature, and build one bulk-loaded R-tree per
    /// source layer. `key` supplies the tile's zoom level for style
    /// zoom-range matching and annotates decode failures.
    pub fn decode(bytes: &[u8], styler: &Styler, key: TileKey, language: &str) -> Result<Tile, Error> {
        Self::try_decode(bytes, styler, key, language).map_err(|source| Error::TileDecode { key, source })
    }

    fn try_decode(bytes: &[u8], styler: &Styler, key: TileKey, language: &str) -> anyhow::Result<Tile> {
        let raw = gunzip_if_needed(bytes)?;
        let decoded: proto::Tile = prost::Message::decode(raw.as_slice())?;
        let zoom = key.z as f64;

        let mut layers = HashMap::new();
        for layer in &decoded.layers {
            let extent = layer.extent();
            let mut features = Vec::new();

            for f in &layer.features {
                let props = decode_properties(layer, f);
                let Some(kind) = geom_kind(f.r#type()) else {
                    continue;
                };
                let Some(style) = styler.get_style_for(&layer.name, zoom, &props) else {
                    continue;
                };

                let color_key = match style.layer_type {
                    LayerType::Fill => "fill-color",
                    LayerType::Line => "line-color",
                    LayerType::Symbol => "text-color",
                    LayerType::Background => "background-color",
                };
                let (r, g, b) = style.paint_color(color_key, "#000000");
                let color = crate::geo::nearest_256(r, g, b);
                let width = style.paint_number("line-width", 1.0);
                let sort_key = props
                    .get("localrank")
                    .or_else(|| props.get("scalerank"))
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as i64;
                let label = (style.layer_type == LayerType::Symbol)
                    .then(|| pick_label(&props, language))
                    .flatten();

                let parts = geometry::decode_commands(&f.geometry);
                push_features(&mut features, kind, parts, &layer.name, &style.id, style.layer_type, label, sort_key, color, width);
            }

            let tree = RTree::bulk_load_with_params(features);
            layers.insert(layer.name.clone(), LayerIndex { extent, tree });
        }

        Ok(Tile { extent: 4096, layers })
    }
}

#[allow(clippy::too_many_arguments)]
fn push_features(
    out: &mut Vec<Feature>,
    kind: GeomKind,
    parts: Vec<Vec<(i64, i64)>>,
    source_layer: &str,
    style_id: &str,
    layer_type: LayerType,
    label: Option<String>,
    sort_key: i64,
    color: u8,
    width: f64,
) {
    match kind {
        GeomKind::Polygon => {
            if parts.is_empty() {
                return;
            }
            out.push(Feature::new(
                source_layer.to_string(),
                style_id.to_string(),
                layer_type,
                label,
                sort_key,
                Geometry::Polygon(parts),
                color,
                width,
            ));
        }
        GeomKind::Line => {
            for part in parts {
                if part.len() < 2 {
                    continue;
                }
                out.push(Feature::new(
                    source_layer.to_string(),
                    style_id.to_string(),
                    layer_type,
                    label.clone(),
                    sort_key,
                    Geometry::Line(part),
                    color,
                    width,
                ));
            }
        }
        GeomKind::Point => {
            for part in parts {
                for p in part {
                    out.push(Feature::new(
                        source_layer.to_string(),
                        style_id.to_string(),
                        layer_type,
                        label.clone(),
                        sort_key,
                        Geometry::Point(p),
                        color,
                        width,
                    ));
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum GeomKind {
    Point,
    Line,
    Polygon,
}

fn geom_kind(t: proto::tile::GeomType) -> Option<GeomKind> {
    match t {
        proto::tile::GeomType::Point => Some(GeomKind::Point),
        proto::tile::GeomType::Linestring => Some(GeomKind::Line),
        proto::tile::GeomType::Polygon => Some(GeomKind::Polygon),
        proto::tile::GeomType::Unknown => None,
    }
}

fn gunzip_if_needed(bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
    if bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B {
        let mut gz = flate2::read::GzDecoder::new(bytes);
        let mut out = Vec::new();
        gz.read_to_end(&mut out)?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}

fn decode_properties(layer: &proto::tile::Layer, f: &proto::tile::Feature) -> Properties {
    let mut props = Properties::new();
    let tags = &f.tags;
    let mut i = 0;
    while i + 1 < tags.len() {
        let (k, v) = (tags[i] as usize, tags[i + 1] as usize);
        i += 2;
        if let (Some(key), Some(val)) = (layer.keys.get(k), layer.values.get(v)) {
            props.insert(key.clone(), decode_value(val));
        }
    }
    props
}

fn decode_value(v: &proto::tile::Value) -> Value {
    if let Some(s) = &v.string_value {
        return Value::Str(s.clone());
    }
    if let Some(b) = v.bool_value {
        return Value::Bool(b);
    }
    if let Some(f) = v.float_value {
        return Value::Num(f as f64);
    }
    if let Some(d) = v.double_value {
        return Value::Num(d);
    }
    if let Some(n) = v.int_value {
        return Value::Num(n as f64);
    }
    if let Some(n) = v.uint_value {
        return Value::Num(n as f64);
    }
    if let Some(n) = v.sint_value {
        return Value::Num(n as f64);
    }
    Value::Bool(false)
}

/// Pick the label text for a symbol feature: `name_<language>`, then
/// `name_en`, then `name`, then `house_num`.
fn pick_label(props: &Properties, language: &str) -> Option<String> {
    let keys = [format!("name_{language}"), "name_en".to_string(), "name".to_string(), "house_num".to_string()];
    for key in &keys {
        if let Some(Value::Str(s)) = props.get(key.as_str()) {
            if !s.is_empty() {
                return Some(s.clone());
            }
        }
    }
    None
}
