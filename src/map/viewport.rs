//! Pan/zoom viewport state: screen-pixel <-> geographic coordinate mapping
//! built on the Web Mercator tile math in [`crate::geo`]. Pan and
//! zoom-at-pointer project through tile coordinates rather than a raw
//! Mercator-normalized plane.

use crate::geo;

/// The visible map area: a geographic center, a zoom level, and the
/// canvas's pixel dimensions (sub-cells, i.e. `Canvas::width/height`).
#[derive(Clone, Debug)]
pub struct Viewport {
    pub center_lon: f64,
    pub center_lat: f64,
    pub zoom: f64,
    pub width: usize,
    pub height: usize,
    pub project_size: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
}

impl Viewport {
    pub fn new(
        center_lon: f64,
        center_lat: f64,
        zoom: f64,
        width: usize,
        height: usize,
        project_size: f64,
        max_zoom: f64,
        zoom_step: f64,
    ) -> Self {
        Self {
            center_lon: geo::normalize_lon(center_lon),
            center_lat: geo::clamp_lat(center_lat),
            zoom: zoom.clamp(0.0, max_zoom),
            width,
            height,
            project_size,
            max_zoom,
            zoom_step,
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    fn tilesize(&self) -> f64 {
        geo::tilesize_at_zoom(self.zoom, self.project_size)
    }

    /// Project a geographic coordinate to canvas-pixel coordinates at the
    /// current center/zoom.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let z = self.zoom.floor();
        let (ctx, cty) = geo::ll2tile(self.center_lon, self.center_lat, z);
        let (tx, ty) = geo::ll2tile(lon, lat, z);
        let tilesize = self.tilesize();
        let x = (tx - ctx) * tilesize + self.width as f64 / 2.0;
        let y = (ty - cty) * tilesize + self.height as f64 / 2.0;
        (x, y)
    }

    /// Inverse of [`Viewport::project`].
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        let z = self.zoom.floor();
        let (ctx, cty) = geo::ll2tile(self.center_lon, self.center_lat, z);
        let tilesize = self.tilesize();
        let tx = ctx + (x - self.width as f64 / 2.0) / tilesize;
        let ty = cty + (y - self.height as f64 / 2.0) / tilesize;
        geo::tile2ll(tx, ty, z)
    }

    /// Pan by a canvas-pixel delta.
    pub fn pan(&mut self, dx: i64, dy: i64) {
        let (lon, lat) = self.unproject(self.width as f64 / 2.0 + dx as f64, self.height as f64 / 2.0 + dy as f64);
        self.center_lon = geo::normalize_lon(lon);
        self.center_lat = geo::clamp_lat(lat);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * (1.0 + self.zoom_step)).min(self.max_zoom);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / (1.0 + self.zoom_step)).max(0.0);
    }

    /// Zoom towards the pointer at canvas-pixel `(px, py)`, keeping the
    /// geographic point under the pointer fixed on screen.
    pub fn zoom_at(&mut self, px: f64, py: f64, factor: f64) {
        let (lon, lat) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(0.0, self.max_zoom);
        let (new_px, new_py) = self.project(lon, lat);
        self.pan((new_px - px).round() as i64, (new_py - py).round() as i64);
    }

    pub fn zoom_in_at(&mut self, px: f64, py: f64) {
        self.zoom_at(px, py, 1.0 + self.zoom_step);
    }

    pub fn zoom_out_at(&mut self, px: f64, py: f64) {
        self.zoom_at(px, py, 1.0 / (1.0 + self.zoom_step));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projecting_the_center_lands_mid_canvas() {
        let vp = Viewport::new(13.4, 52.5, 4.0, 200, 100, 256.0, 18.0, 0.5);
        let (x, y) = vp.project(13.4, 52.5);
        assert!((x - 100.0).abs() < 1e-6);
        assert!((y - 50.0).abs() < 1e-6);
    }

    #[test]
    fn project_unproject_round_trips() {
        let vp = Viewport::new(0.0, 0.0, 6.0, 300, 200, 256.0, 18.0, 0.5);
        let (x, y) = vp.project(12.3, -4.5);
        let (lon, lat) = vp.unproject(x, y);
        assert!((lon - 12.3).abs() < 1e-6);
        assert!((lat - (-4.5)).abs() < 1e-6);
    }

    #[test]
    fn zoom_at_keeps_pointer_location_fixed() {
        let mut vp = Viewport::new(0.0, 0.0, 4.0, 200, 200, 256.0, 18.0, 0.5);
        let (lon, lat) = vp.unproject(140.0, 60.0);
        vp.zoom_in_at(140.0, 60.0);
        let (x, y) = vp.project(lon, lat);
        assert!((x - 140.0).abs() < 1.0);
        assert!((y - 60.0).abs() < 1.0);
    }

    #[test]
    fn pan_moves_center_and_wraps_longitude() {
        let mut vp = Viewport::new(179.5, 0.0, 2.0, 100, 100, 256.0, 18.0, 0.5);
        vp.pan(500, 0);
        assert!(vp.center_lon < 0.0 || vp.center_lon > 170.0);
    }
}
