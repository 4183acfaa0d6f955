//! The decoded, styled record a `Tile`'s R-trees are built from.

use crate::style::LayerType;
use rstar::{RTreeObject, AABB};

#[derive(Debug, Clone)]
pub enum Geometry {
    /// Full ring list (outer + holes) for a `fill` feature.
    Polygon(Vec<Vec<(i64, i64)>>),
    /// One line-string part, already split out of its source geometry.
    Line(Vec<(i64, i64)>),
    Point((i64, i64)),
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub source_layer: String,
    pub style_id: String,
    pub layer_type: LayerType,
    pub label: Option<String>,
    pub sort_key: i64,
    pub geometry: Geometry,
    pub color: u8,
    pub width: f64,
    bbox: [[f64; 2]; 2],
}

impl Feature {
    pub fn new(
        source_layer: String,
        style_id: String,
        layer_type: LayerType,
        label: Option<String>,
        sort_key: i64,
        geometry: Geometry,
        color: u8,
        width: f64,
    ) -> Self {
        let bbox = bbox_of(&geometry);
        Self {
            source_layer,
            style_id,
            layer_type,
            label,
            sort_key,
            geometry,
            color,
            width,
            bbox,
        }
    }

    pub fn bbox(&self) -> ([f64; 2], [f64; 2]) {
        (self.bbox[0], self.bbox[1])
    }
}

impl RTreeObject for Feature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox[0], self.bbox[1])
    }
}

fn bbox_of(geom: &Geometry) -> [[f64; 2]; 2] {
    let mut min = [f64::INFINITY, f64::INFINITY];
    let mut max = [f64::NEG_INFINITY, f64::NEG_INFINITY];
    let mut extend = |p: (i64, i64)| {
        let (x, y) = (p.0 as f64, p.1 as f64);
        min[0] = min[0].min(x);
        min[1] = min[1].min(y);
        max[0] = max[0].max(x);
        max[1] = max[1].max(y);
    };

    match geom {
        Geometry::Polygon(rings) => rings.iter().flatten().for_each(|&p| extend(p)),
        Geometry::Line(pts) => pts.iter().for_each(|&p| extend(p)),
        Geometry::Point(p) => extend(*p),
    }

    if !min[0].is_finite() {
        return [[0.0, 0.0], [0.0, 0.0]];
    }
    [min, max]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_bbox_is_degenerate() {
        let f = Feature::new(
            "poi".into(),
            "poi-label".into(),
            LayerType::Symbol,
            Some("Cafe".into()),
            0,
            Geometry::Point((10, 20)),
            1,
            1.0,
        );
        assert_eq!(f.bbox(), ([10.0, 20.0], [10.0, 20.0]));
    }

    #[test]
    fn polygon_bbox_covers_all_rings() {
        let f = Feature::new(
            "water".into(),
            "water-fill".into(),
            LayerType::Fill,
            None,
            0,
            Geometry::Polygon(vec![vec![(0, 0), (10, 0), (10, 10), (0, 10)]]),
            2,
            1.0,
        );
        assert_eq!(f.bbox(), ([0.0, 0.0], [10.0, 10.0]));
    }
}
