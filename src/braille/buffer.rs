//! Sub-cell pixel raster: packs a 2x4 grid of pixels per terminal cell into
//! a Unicode braille glyph (or an ASCII-block fallback), with per-cell
//! foreground/background color, and serializes the whole grid into a
//! single minimal-SGR-escape-coded string.
//!
//! Flat row-major byte arrays (`pixel`, `fg`, `bg`, `char`) mirror the
//! teacher's single-pointer-chase `BrailleCanvas` layout: one allocation,
//! sequential cache-friendly access, one memcpy on clone.

use unicode_width::UnicodeWidthStr;

/// Braille bit position lookup: `BIT_TABLE[y & 3][x & 1]`.
/// ```text
///  col0  col1
///  0x01  0x08   row 0
///  0x02  0x10   row 1
///  0x04  0x20   row 2
///  0x40  0x80   row 3
/// ```
static BIT_TABLE: [[u8; 2]; 4] = [[0, 3], [1, 4], [2, 5], [6, 7]];

/// One character cell's worth of `▘▝▀▖▌▞▛▗▚▐▜▄▙▟█`-style ASCII-block glyphs,
/// indexed by how many of the 4 braille quadrants (top-left, top-right,
/// bottom-left, bottom-right) they cover, used for the `useBraille = false`
/// fallback. Each entry pairs a glyph with the braille-bit mask it most
/// resembles; `frame()` picks the table entry whose mask has the most bits
/// in common with the cell's actual mask (popcount ranking, ties broken by
/// table order).
static ASCII_FALLBACK: [(char, u8); 16] = [
    (' ', 0b0000_0000),
    ('\'', 0b0000_0001),
    ('`', 0b0000_1000),
    ('"', 0b0000_1001),
    (',', 0b0000_0010),
    ('|', 0b0000_0011),
    ('/', 0b0000_1010),
    ('\\', 0b0100_0000),
    ('.', 0b1000_0000),
    ('_', 0b0100_1000),
    (':', 0b0000_1100),
    ('=', 0b0100_0001),
    ('o', 0b0000_0110),
    ('x', 0b1000_1001),
    ('#', 0b1111_0011),
    ('█', 0b1111_1111),
];

#[derive(Clone, Copy, PartialEq, Eq)]
struct Sgr {
    fg: Option<u8>,
    bg: Option<u8>,
}

impl Sgr {
    fn escape(self) -> String {
        match (self.fg, self.bg) {
            (Some(fg), Some(bg)) => format!("\x1b[38;5;{fg};48;5;{bg}m"),
            (Some(fg), None) => format!("\x1b[49;38;5;{fg}m"),
            (None, Some(bg)) => format!("\x1b[39;48;5;{bg}m"),
            (None, None) => "\x1b[39;49m".to_string(),
        }
    }
}

const RESET: &str = "\x1b[39;49m";

/// Sub-character pixel raster. Width is in sub-cells (even); height is a
/// multiple of 4. A terminal cell index is `i = (x>>1) + (W>>1)*(y>>2)`.
#[derive(Clone)]
pub struct BrailleBuffer {
    width: usize,  // sub-cell (pixel) width
    height: usize, // sub-cell (pixel) height
    cell_w: usize, // width / 2
    cell_h: usize, // height / 4
    pixel: Vec<u8>,
    fg: Vec<u8>,
    bg: Vec<u8>,
    has_fg: Vec<bool>,
    has_bg: Vec<bool>,
    ch: Vec<Option<String>>,
    ch_fg: Vec<u8>,
    global_bg: Option<u8>,
    use_braille: bool,
    delimiter: String,
}

impl BrailleBuffer {
    /// `width`/`height` are in pixels (sub-cells); `width` must be even and
    /// `height` a multiple of 4 for every pixel to address a real cell.
    pub fn new(width: usize, height: usize) -> Self {
        let cell_w = (width + 1) / 2;
        let cell_h = (height + 3) / 4;
        let n = cell_w * cell_h;
        Self {
            width,
            height,
            cell_w,
            cell_h,
            pixel: vec![0u8; n],
            fg: vec![0u8; n],
            bg: vec![0u8; n],
            has_fg: vec![false; n],
            has_bg: vec![false; n],
            ch: vec![None; n],
            ch_fg: vec![0u8; n],
            global_bg: None,
            use_braille: true,
            delimiter: "\n\r".to_string(),
        }
    }

    pub fn set_use_braille(&mut self, use_braille: bool) {
        self.use_braille = use_braille;
    }

    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        self.delimiter = delimiter.into();
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell_width(&self) -> usize {
        self.cell_w
    }

    pub fn cell_height(&self) -> usize {
        self.cell_h
    }

    #[inline]
    fn cell_index(&self, x: usize, y: usize) -> Option<usize> {
        let cx = x >> 1;
        let cy = y >> 2;
        if cx >= self.cell_w || cy >= self.cell_h {
            None
        } else {
            Some(cy * self.cell_w + cx)
        }
    }

    /// Zero all four arrays.
    pub fn clear(&mut self) {
        self.pixel.fill(0);
        self.fg.fill(0);
        self.bg.fill(0);
        self.has_fg.fill(false);
        self.has_bg.fill(false);
        for c in &mut self.ch {
            *c = None;
        }
        self.global_bg = None;
    }

    /// No-op if out of range; otherwise OR the braille bitmask into the
    /// cell and set its foreground color.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: u8) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if let Some(i) = self.cell_index(x, y) {
            let bit = 1u8 << BIT_TABLE[y & 3][x & 1];
            self.pixel[i] |= bit;
            self.fg[i] = color;
            self.has_fg[i] = true;
        }
    }

    /// AND-NOT the braille bitmask for this pixel.
    pub fn unset_pixel(&mut self, x: i64, y: i64) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if let Some(i) = self.cell_index(x, y) {
            let bit = 1u8 << BIT_TABLE[y & 3][x & 1];
            self.pixel[i] &= !bit;
        }
    }

    pub fn set_background(&mut self, x: i64, y: i64, color: u8) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if let Some(i) = self.cell_index(x, y) {
            self.bg[i] = color;
            self.has_bg[i] = true;
        }
    }

    /// Used as the background floor during emission, for any cell that
    /// never had an explicit per-cell background set.
    pub fn set_global_background(&mut self, color: u8) {
        self.global_bg = Some(color);
    }

    /// Store an override character + its foreground color for this cell;
    /// the overridden cell renders `ch` instead of its braille glyph.
    pub fn set_char(&mut self, ch: &str, x: i64, y: i64, color: u8) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        if let Some(i) = self.cell_index(x, y) {
            self.ch[i] = Some(ch.to_string());
            self.ch_fg[i] = color;
        }
    }

    /// Place `text` one sub-cell apart horizontally (`x += 2` per code
    /// point), optionally centered by shifting `x` by `-width(text)/2 - 1`
    /// (unicode-width-aware, so wide/CJK text centers correctly).
    pub fn write_text(&mut self, text: &str, x: i64, y: i64, color: u8, center: bool) {
        let mut x = x;
        if center {
            let w = UnicodeWidthStr::width(text) as i64;
            x -= w / 2 + 1;
        }
        for grapheme in text.chars() {
            let mut buf = [0u8; 4];
            self.set_char(grapheme.encode_utf8(&mut buf), x, y, color);
            x += 2;
        }
    }

    #[inline]
    fn resolved_bg(&self, i: usize) -> Option<u8> {
        if self.has_bg[i] {
            Some(self.bg[i])
        } else {
            self.global_bg
        }
    }

    fn ascii_glyph(mask: u8) -> char {
        ASCII_FALLBACK
            .iter()
            .max_by_key(|(_, m)| (m & mask).count_ones())
            .map(|(c, _)| *c)
            .unwrap_or(' ')
    }

    /// Row-major `(glyph, fg, bg)` per cell: the same content `frame()`
    /// serializes, but structured for a caller (the ratatui driver) that
    /// wants to set its own buffer cells instead of re-parsing SGR escapes.
    /// A continuation cell hidden under a preceding wide glyph yields an
    /// empty string.
    pub fn cell_glyphs(&self) -> Vec<(String, Option<u8>, Option<u8>)> {
        let mut out = Vec::with_capacity(self.pixel.len());
        let mut skip = 0usize;
        for i in 0..self.pixel.len() {
            let fg = if self.ch[i].is_some() {
                Some(self.ch_fg[i])
            } else if self.has_fg[i] {
                Some(self.fg[i])
            } else {
                None
            };
            let bg = self.resolved_bg(i);

            if let Some(ch) = &self.ch[i] {
                skip = UnicodeWidthStr::width(ch.as_str()).saturating_sub(1);
                out.push((ch.clone(), fg, bg));
            } else if skip > 0 {
                skip -= 1;
                out.push((String::new(), fg, bg));
            } else if self.use_braille {
                let glyph = char::from_u32(0x2800 + self.pixel[i] as u32).unwrap_or(' ');
                out.push((glyph.to_string(), fg, bg));
            } else {
                out.push((Self::ascii_glyph(self.pixel[i]).to_string(), fg, bg));
            }
        }
        out
    }

    /// Serialize the grid: row-major, a delimiter between rows, minimal
    /// SGR re-emission (a new escape is only written when it differs from
    /// the last one emitted), terminated by a reset + one final delimiter.
    pub fn frame(&self) -> String {
        let cells = self.cell_glyphs();
        let mut out = String::new();
        let mut last: Option<Sgr> = None;

        for cy in 0..self.cell_h {
            if cy > 0 {
                out.push_str(&self.delimiter);
            }
            for cx in 0..self.cell_w {
                let i = cy * self.cell_w + cx;
                let (text, fg, bg) = &cells[i];
                let sgr = Sgr { fg: *fg, bg: *bg };
                if last != Some(sgr) {
                    out.push_str(&sgr.escape());
                    last = Some(sgr);
                }
                out.push_str(text);
            }
        }

        out.push_str(RESET);
        out.push_str(&self.delimiter);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pixel_frame() {
        let mut b = BrailleBuffer::new(4, 4);
        b.set_pixel(0, 0, 0);
        let f = b.frame();
        assert!(f.starts_with("\x1b[39;49m"));
        assert!(f.contains('\u{2801}'));
        assert!(f.ends_with(&format!("{RESET}\n\r")));
    }

    #[test]
    fn clear_resets_to_u2800() {
        let mut b = BrailleBuffer::new(2, 4);
        b.set_pixel(0, 0, 5);
        b.clear();
        let f = b.frame();
        assert!(f.contains('\u{2800}'));
        assert!(!f.contains('\u{2801}'));
    }

    #[test]
    fn sgr_sequences_are_state_compressed() {
        let mut b = BrailleBuffer::new(4, 4);
        b.set_pixel(0, 0, 1);
        b.set_pixel(2, 0, 1); // same color -> no new escape between cells
        b.set_pixel(3, 3, 2);
        let f = b.frame();
        let mut seqs = Vec::new();
        let mut rest = f.as_str();
        while let Some(start) = rest.find("\x1b[") {
            let after = &rest[start + 2..];
            let end = after.find('m').unwrap();
            seqs.push(after[..end].to_string());
            rest = &after[end + 1..];
        }
        for pair in seqs.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn set_then_unset_restores_mask() {
        let mut b = BrailleBuffer::new(2, 4);
        let before = b.pixel[0];
        b.set_pixel(0, 0, 3);
        b.unset_pixel(0, 0);
        assert_eq!(b.pixel[0], before);
    }

    #[test]
    fn background_uses_cell_then_global_not_or() {
        let mut b = BrailleBuffer::new(2, 4);
        b.set_global_background(7);
        b.set_pixel(0, 0, 1);
        assert_eq!(b.resolved_bg(0), Some(7));
        b.set_background(0, 0, 9);
        assert_eq!(b.resolved_bg(0), Some(9));
    }

    #[test]
    fn ascii_fallback_has_no_braille_codepoints() {
        let mut b = BrailleBuffer::new(2, 4);
        b.set_use_braille(false);
        b.set_pixel(0, 0, 1);
        b.set_pixel(1, 3, 1);
        let f = b.frame();
        assert!(!f.chars().any(|c| ('\u{2800}'..='\u{28ff}').contains(&c)));
    }

    #[test]
    fn wide_char_skips_the_following_cell() {
        // A full-width glyph occupies 2 terminal cells; the next cell's
        // pixel content must not be emitted underneath it.
        let mut b = BrailleBuffer::new(8, 4);
        b.set_char("\u{6587}", 0, 0, 3); // 文, unicode-width 2
        b.set_pixel(2, 0, 5); // would land in the covered cell
        let f = b.frame();
        assert_eq!(f.matches('\u{6587}').count(), 1);
        assert!(!f.contains('\u{2801}'));
    }
}
