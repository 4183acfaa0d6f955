//! Compiled Mapbox-style filters and per-feature style lookup.

mod filter;

pub use filter::{compile_filter, Filter};

use crate::value::Properties;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerType {
    Fill,
    Line,
    Symbol,
    Background,
}

impl LayerType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "fill" => Some(LayerType::Fill),
            "line" => Some(LayerType::Line),
            "symbol" => Some(LayerType::Symbol),
            "background" => Some(LayerType::Background),
            _ => None,
        }
    }
}

/// One layer of the style document as written (pre-`ref`-resolution,
/// pre-constant-substitution, pre-filter-compilation).
#[derive(Debug, Clone, Deserialize)]
struct RawLayer {
    id: String,
    #[serde(rename = "type")]
    layer_type: Option<String>,
    #[serde(rename = "source-layer")]
    source_layer: Option<String>,
    #[serde(rename = "ref")]
    reference: Option<String>,
    minzoom: Option<f64>,
    maxzoom: Option<f64>,
    filter: Option<serde_json::Value>,
    #[serde(default)]
    paint: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStyleDoc {
    #[allow(dead_code)]
    name: Option<String>,
    #[serde(default)]
    constants: HashMap<String, serde_json::Value>,
    layers: Vec<RawLayer>,
}

/// A fully compiled style layer: fixed fields, no more runtime field-name
/// indirection for `ref` lookups.
pub struct CompiledLayer {
    pub id: String,
    pub layer_type: LayerType,
    pub source_layer: Option<String>,
    pub minzoom: f64,
    pub maxzoom: f64,
    pub paint: serde_json::Value,
    pub filter: Filter,
}

impl CompiledLayer {
    pub fn in_zoom_range(&self, zoom: f64) -> bool {
        zoom >= self.minzoom && zoom <= self.maxzoom
    }

    /// Look up a paint property, resolving a zoom-stop array (`{"stops":
    /// [[z0, v0], [z1, v1], ...]}`) to its first stop's value, per the
    /// spec's explicit "only the first stop is honored" simplification.
    pub fn paint_value(&self, key: &str) -> Option<&serde_json::Value> {
        let v = self.paint.get(key)?;
        if let Some(stops) = v.get("stops").and_then(|s| s.as_array()) {
            stops.first().and_then(|pair| pair.as_array()).and_then(|p| p.get(1))
        } else {
            Some(v)
        }
    }

    pub fn paint_number(&self, key: &str, default: f64) -> f64 {
        self.paint_value(key).and_then(|v| v.as_f64()).unwrap_or(default)
    }

    pub fn paint_color(&self, key: &str, default: &str) -> (u8, u8, u8) {
        let s = self
            .paint_value(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default);
        crate::geo::parse_css_color(s)
    }
}

/// Compiled style: layers in declaration order, indexed by id and by
/// source-layer for `Tile::build`'s per-feature lookup.
pub struct Styler {
    layers: Vec<CompiledLayer>,
    by_id: HashMap<String, usize>,
    by_source_layer: HashMap<String, Vec<usize>>,
}

impl Styler {
    /// Parse (via `simd-json`) and compile a style document from its raw
    /// bytes.
    pub fn from_bytes(mut bytes: Vec<u8>) -> anyhow::Result<Self> {
        let raw: RawStyleDoc = simd_json::serde::from_slice(&mut bytes)?;
        Ok(Self::compile(raw))
    }

    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        Self::from_bytes(s.as_bytes().to_vec())
    }

    fn compile(doc: RawStyleDoc) -> Self {
        let constants = doc.constants;
        let mut resolved: Vec<RawLayer> = Vec::with_capacity(doc.layers.len());
        let mut by_id_raw: HashMap<String, usize> = HashMap::new();

        for mut layer in doc.layers {
            substitute_constants(&mut layer.filter, &constants);
            substitute_json(&mut layer.paint, &constants);

            if let Some(ref_id) = layer.reference.clone() {
                if let Some(&idx) = by_id_raw.get(&ref_id) {
                    let base = resolved[idx].clone();
                    if layer.layer_type.is_none() {
                        layer.layer_type = base.layer_type;
                    }
                    if layer.source_layer.is_none() {
                        layer.source_layer = base.source_layer;
                    }
                    if layer.minzoom.is_none() {
                        layer.minzoom = base.minzoom;
                    }
                    if layer.maxzoom.is_none() {
                        layer.maxzoom = base.maxzoom;
                    }
                    if layer.filter.is_none() {
                        layer.filter = base.filter;
                    }
                }
            }

            by_id_raw.insert(layer.id.clone(), resolved.len());
            resolved.push(layer);
        }

        let mut layers = Vec::with_capacity(resolved.len());
        let mut by_id = HashMap::new();
        let mut by_source_layer: HashMap<String, Vec<usize>> = HashMap::new();

        for raw in resolved {
            let layer_type = raw
                .layer_type
                .as_deref()
                .and_then(LayerType::parse)
                .unwrap_or(LayerType::Line);
            let filter = raw.filter.as_ref().map(compile_filter).unwrap_or(Filter::Always);

            let idx = layers.len();
            by_id.insert(raw.id.clone(), idx);
            if let Some(sl) = &raw.source_layer {
                by_source_layer.entry(sl.clone()).or_default().push(idx);
            }

            layers.push(CompiledLayer {
                id: raw.id,
                layer_type,
                source_layer: raw.source_layer,
                minzoom: raw.minzoom.unwrap_or(0.0),
                maxzoom: raw.maxzoom.unwrap_or(24.0),
                paint: raw.paint,
                filter,
            });
        }

        Self {
            layers,
            by_id,
            by_source_layer,
        }
    }

    pub fn layer_by_id(&self, id: &str) -> Option<&CompiledLayer> {
        self.by_id.get(id).map(|&i| &self.layers[i])
    }

    /// All layers, in style-declaration order (the order features across
    /// layers are painted in).
    pub fn layers(&self) -> &[CompiledLayer] {
        &self.layers
    }

    /// First layer (in declaration order) targeting `source_layer` whose
    /// zoom range includes `zoom` and whose filter accepts `props`.
    pub fn get_style_for(&self, source_layer: &str, zoom: f64, props: &Properties) -> Option<&CompiledLayer> {
        let candidates = self.by_source_layer.get(source_layer)?;
        candidates
            .iter()
            .map(|&i| &self.layers[i])
            .find(|l| l.in_zoom_range(zoom) && l.filter.eval(props))
    }
}

/// Recursively substitute any string starting with `@` by the constant of
/// that name, inside a filter expression tree.
fn substitute_constants(filter: &mut Option<serde_json::Value>, constants: &HashMap<String, serde_json::Value>) {
    if let Some(v) = filter {
        substitute_json(v, constants);
    }
}

fn substitute_json(v: &mut serde_json::Value, constants: &HashMap<String, serde_json::Value>) {
    match v {
        serde_json::Value::String(s) => {
            if s.starts_with('@') {
                if let Some(resolved) = constants.get(s.as_str()) {
                    *v = resolved.clone();
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                substitute_json(item, constants);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                substitute_json(item, constants);
            }
        }
        _ => {}
    }
}
