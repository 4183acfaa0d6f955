//! Web Mercator projection, tile coordinate math, longitude/latitude
//! wrapping, and CSS-color -> 256-palette conversion.

use std::f64::consts::PI;

/// Mercator's valid latitude domain; `tile2ll` never returns outside it.
pub const MAX_LATITUDE: f64 = 85.0511;

/// Normalize longitude into `[-180, 180)`.
#[inline]
pub fn normalize_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can land exactly on 180.0 for inputs congruent to -180
    // mod 360; fold that edge back into the half-open range.
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Clamp latitude into the Mercator-safe domain `|lat| <= 85.0511`.
#[inline]
pub fn clamp_lat(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

/// Fractional tile coordinates for `(lon, lat)` at zoom `z`.
pub fn ll2tile(lon: f64, lat: f64, z: f64) -> (f64, f64) {
    let n = 2f64.powf(z);
    let lat_rad = clamp_lat(lat).to_radians();
    let x = (normalize_lon(lon) + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Inverse of [`ll2tile`]: fractional tile coordinates back to `(lon, lat)`.
pub fn tile2ll(tx: f64, ty: f64, z: f64) -> (f64, f64) {
    let n = 2f64.powf(z);
    let lon = tx / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * ty / n)).sinh().atan();
    (normalize_lon(lon), lat_rad.to_degrees())
}

/// Canvas-pixel size of one tile at a (possibly fractional) zoom level.
pub fn tilesize_at_zoom(zoom: f64, project_size: f64) -> f64 {
    project_size * 2f64.powf(zoom - zoom.floor())
}

/// Parse a CSS color (`#rgb`, `#rrggbb`, `#rrggbbaa`, or `rgb(r,g,b)`) into
/// an `(r, g, b)` triple. Unrecognized input falls back to black, matching
/// the "degrade, don't fail" rule for style-compile errors.
pub fn parse_css_color(s: &str) -> (u8, u8, u8) {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex).unwrap_or((0, 0, 0));
    }
    if let Some(inner) = s.strip_prefix("rgb(").and_then(|r| r.strip_suffix(')')) {
        let mut it = inner.split(',').map(|p| p.trim().parse::<u8>().unwrap_or(0));
        let r = it.next().unwrap_or(0);
        let g = it.next().unwrap_or(0);
        let b = it.next().unwrap_or(0);
        return (r, g, b);
    }
    (0, 0, 0)
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let expand = |c: char| -> Option<u8> { u8::from_str_radix(&format!("{c}{c}"), 16).ok() };
    match hex.len() {
        3 | 4 => {
            let mut chars = hex.chars();
            let r = expand(chars.next()?)?;
            let g = expand(chars.next()?)?;
            let b = expand(chars.next()?)?;
            Some((r, g, b))
        }
        6 | 8 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        _ => None,
    }
}

/// The 6 intensity steps used by the xterm 216-color cube (indices 16-231).
const CUBE_STEPS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// Nearest index in the standard xterm 256-color palette for an `(r,g,b)`
/// triple, by Euclidean distance. Indices 16-231 are the 6x6x6 RGB cube,
/// 232-255 are a 24-step grayscale ramp; both are searched and the closer
/// of the two wins (indices 0-15 are not distinguishable from the cube
/// without a concrete terminal theme, so they are left out of the search).
pub fn nearest_256(r: u8, g: u8, b: u8) -> u8 {
    let dist = |r1: i32, g1: i32, b1: i32| -> i32 {
        let dr = r1 - r as i32;
        let dg = g1 - g as i32;
        let db = b1 - b as i32;
        dr * dr + dg * dg + db * db
    };

    let nearest_step = |v: u8| -> usize {
        CUBE_STEPS
            .iter()
            .enumerate()
            .min_by_key(|(_, &s)| (s as i32 - v as i32).abs())
            .map(|(i, _)| i)
            .unwrap_or(0)
    };

    let ri = nearest_step(r);
    let gi = nearest_step(g);
    let bi = nearest_step(b);
    let cube_idx = 16 + 36 * ri + 6 * gi + bi;
    let cube_dist = dist(
        CUBE_STEPS[ri] as i32,
        CUBE_STEPS[gi] as i32,
        CUBE_STEPS[bi] as i32,
    );

    let gray = ((r as u32 + g as u32 + b as u32) / 3) as u8;
    let gray_idx = ((gray as i32 - 8).max(0) / 10).min(23) as usize;
    let gray_level = 8 + gray_idx as i32 * 10;
    let gray_dist = dist(gray_level, gray_level, gray_level);

    if gray_dist < cube_dist {
        (232 + gray_idx) as u8
    } else {
        cube_idx as u8
    }
}

/// Parse a CSS color string directly to a palette index.
pub fn color_to_256(s: &str) -> u8 {
    let (r, g, b) = parse_css_color(s);
    nearest_256(r, g, b)
}
