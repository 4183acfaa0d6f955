//! Collision-rejecting 2-D index for label/marker placement: a thin layer
//! over an R-tree of axis-aligned rectangles in cell-space.

use rstar::{RTree, RTreeObject, AABB};
use unicode_width::UnicodeWidthStr;

#[derive(Clone)]
struct LabelRect<F> {
    min: [f64; 2],
    max: [f64; 2],
    pub feature: F,
}

impl<F: Clone> RTreeObject for LabelRect<F> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Rejects any placement whose rectangle overlaps one already accepted
/// this frame. Generic over the feature-reference type a caller wants to
/// recover via [`LabelBuffer::features_at`].
pub struct LabelBuffer<F: Clone> {
    tree: RTree<LabelRect<F>>,
}

impl<F: Clone> Default for LabelBuffer<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Clone> LabelBuffer<F> {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Reset the index at the start of each frame.
    pub fn clear(&mut self) {
        self.tree = RTree::new();
    }

    /// Attempt to place `text` centered at cell-space `(x, y)`. The
    /// rectangle is `[x-margin, x+margin+width(text)] x [y-margin/2,
    /// y+margin/2]`. Returns `false` (no insert) if it overlaps any
    /// rectangle already placed this frame.
    pub fn write_if_possible(&mut self, text: &str, x: f64, y: f64, feature: F, margin: f64) -> bool {
        let w = UnicodeWidthStr::width(text) as f64;
        let min = [x - margin, y - margin / 2.0];
        let max = [x + margin + w, y + margin / 2.0];
        let envelope = AABB::from_corners(min, max);

        if self.tree.locate_in_envelope_intersecting(&envelope).next().is_some() {
            return false;
        }

        self.tree.insert(LabelRect { min, max, feature });
        true
    }

    /// All placed rectangles covering the given cell-space point.
    pub fn features_at(&self, x: f64, y: f64) -> Vec<&F> {
        let point_env = AABB::from_point([x, y]);
        self.tree
            .locate_in_envelope_intersecting(&point_env)
            .map(|r| &r.feature)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_rejects_overlap_but_not_distant_placement() {
        let mut labels: LabelBuffer<u32> = LabelBuffer::new();
        assert!(labels.write_if_possible("Paris", 10.0, 10.0, 1, 5.0));
        assert!(!labels.write_if_possible("Paris", 12.0, 10.0, 2, 5.0));
        assert!(labels.write_if_possible("Paris", 80.0, 80.0, 3, 5.0));
    }

    #[test]
    fn monotone_once_inserted_never_displaced() {
        let mut labels: LabelBuffer<u32> = LabelBuffer::new();
        assert!(labels.write_if_possible("A", 0.0, 0.0, 1, 2.0));
        for _ in 0..5 {
            assert!(!labels.write_if_possible("A", 0.5, 0.0, 2, 2.0));
        }
    }

    #[test]
    fn features_at_point_returns_covering_rects() {
        let mut labels: LabelBuffer<&str> = LabelBuffer::new();
        labels.write_if_possible("X", 10.0, 10.0, "city", 3.0);
        assert_eq!(labels.features_at(10.0, 10.0), vec![&"city"]);
        assert!(labels.features_at(100.0, 100.0).is_empty());
    }

    #[test]
    fn clear_empties_index() {
        let mut labels: LabelBuffer<u32> = LabelBuffer::new();
        labels.write_if_possible("A", 0.0, 0.0, 1, 1.0);
        labels.clear();
        assert!(labels.is_empty());
        assert!(labels.write_if_possible("A", 0.0, 0.0, 2, 1.0));
    }
}
