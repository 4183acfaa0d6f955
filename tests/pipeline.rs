//! Exercises the full decode -> style -> render pipeline across module
//! boundaries: a hand-encoded Mapbox Vector Tile protobuf, a Mapbox-GL
//! style document, and a `Renderer` draw through a fixture `TileFetcher`.

use std::sync::atomic::{AtomicUsize, Ordering};

use vtmap::error::TileKey;
use vtmap::map::{Renderer, Viewport};
use vtmap::style::Styler;
use vtmap::tile::source::TileFetcher;
use vtmap::tile::{Geometry, Tile, TileSource};

fn varint(mut n: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (n & 0x7f) as u8;
        n >>= 7;
        if n != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
    out
}

fn tag(field: u32, wire_type: u32) -> Vec<u8> {
    varint(((field as u64) << 3) | wire_type as u64)
}

fn varint_field(field: u32, n: u64) -> Vec<u8> {
    let mut out = tag(field, 0);
    out.extend(varint(n));
    out
}

fn len_field(field: u32, data: &[u8]) -> Vec<u8> {
    let mut out = tag(field, 2);
    out.extend(varint(data.len() as u64));
    out.extend_from_slice(data);
    out
}

fn zigzag(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Hand-rolls a single-layer, single-`LineString`-feature Mapbox Vector
/// Tile (v2.1) protobuf, matching `proto/vector_tile.proto`. The geometry
/// is a two-point line from `(2,2)` to `(8,2)` in tile-extent space; the
/// feature carries one property, `class = "motorway"`.
fn fixture_tile_bytes() -> Vec<u8> {
    let mut geometry = Vec::new();
    geometry.extend(varint(9)); // MoveTo, count=1
    geometry.extend(varint(zigzag(2)));
    geometry.extend(varint(zigzag(2)));
    geometry.extend(varint(10)); // LineTo, count=1
    geometry.extend(varint(zigzag(6)));
    geometry.extend(varint(zigzag(0)));

    let mut tags = Vec::new();
    tags.extend(varint(0)); // key index 0 ("class")
    tags.extend(varint(0)); // value index 0 ("motorway")

    let mut feature = Vec::new();
    feature.extend(len_field(2, &tags)); // Feature.tags (packed)
    feature.extend(varint_field(3, 2)); // Feature.type = LINESTRING
    feature.extend(len_field(4, &geometry)); // Feature.geometry (packed)

    let value_msg = len_field(1, b"motorway"); // Value.string_value

    let mut layer = Vec::new();
    layer.extend(varint_field(15, 1)); // Layer.version
    layer.extend(len_field(1, b"roads")); // Layer.name
    layer.extend(len_field(2, &feature)); // Layer.features[0]
    layer.extend(len_field(3, b"class")); // Layer.keys[0]
    layer.extend(len_field(4, &value_msg)); // Layer.values[0]
    layer.extend(varint_field(5, 4096)); // Layer.extent

    len_field(3, &layer) // Tile.layers[0]
}

fn fixture_style() -> Styler {
    Styler::from_str(
        r#"{
            "layers": [
                {
                    "id": "roads",
                    "type": "line",
                    "source-layer": "roads",
                    "filter": ["==", "class", "motorway"],
                    "paint": {"line-color": "#ff0000", "line-width": 2.0}
                }
            ]
        }"#,
    )
    .expect("style document should compile")
}

#[test]
fn decode_then_style_produces_a_matching_line_feature() {
    let styler = fixture_style();
    let tile = Tile::decode(&fixture_tile_bytes(), &styler, TileKey { z: 10, x: 0, y: 0 }, "en")
        .expect("well-formed fixture tile should decode");

    let index = tile.layers.get("roads").expect("roads layer present");
    assert_eq!(index.extent, 4096);

    let hits: Vec<_> = index.tree.iter().collect();
    assert_eq!(hits.len(), 1);
    let feature = hits[0];
    assert_eq!(feature.style_id, "roads");
    assert_eq!(feature.width, 2.0);
    match &feature.geometry {
        Geometry::Line(pts) => assert_eq!(pts, &vec![(2, 2), (8, 2)]),
        other => panic!("expected a Line geometry, got {other:?}"),
    }
}

#[test]
fn unstyled_layer_is_skipped_not_errored() {
    // A filter that matches nothing leaves the tile with zero features
    // for that layer, rather than failing the decode.
    let styler = Styler::from_str(
        r#"{"layers": [{"id": "roads", "type": "line", "source-layer": "roads", "filter": ["==", "class", "primary"]}]}"#,
    )
    .unwrap();
    let tile = Tile::decode(&fixture_tile_bytes(), &styler, TileKey { z: 10, x: 0, y: 0 }, "en").unwrap();
    let index = tile.layers.get("roads").unwrap();
    assert_eq!(index.tree.size(), 0);
}

struct FixtureFetcher {
    bytes: Vec<u8>,
    calls: AtomicUsize,
}

impl TileFetcher for FixtureFetcher {
    fn fetch(&self, _key: TileKey) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes.clone())
    }
}

#[test]
fn renderer_draws_a_styled_line_feature_from_a_fetched_tile() {
    let fetcher = FixtureFetcher { bytes: fixture_tile_bytes(), calls: AtomicUsize::new(0) };
    let mut source = TileSource::with_fetcher(Box::new(fetcher), fixture_style(), "en".to_string(), 16, false);

    // Centered near the fixture tile's origin at zoom 10, wide enough to
    // cover the whole tile-extent line we encoded.
    let (lon, lat) = vtmap::geo::tile2ll(0.5, 0.5, 10.0);
    let viewport = Viewport::new(lon, lat, 10.0, 64, 64, 256.0, 18.0, 0.5);

    let mut renderer = Renderer::new(64, 64, 256.0, "\u{25c9}".to_string(), 2.0);
    let frame = renderer.draw(&mut source, &viewport).expect("draw should succeed against the fixture fetcher");

    // The line's color (#ff0000) must show up as an SGR foreground escape
    // somewhere in the emitted frame, and the frame must contain at least
    // one non-blank braille glyph (the rasterized line).
    let red_256 = vtmap::geo::color_to_256("#ff0000");
    assert!(frame.contains(&format!("38;5;{red_256}")), "frame should select the line's color:\n{frame}");
    assert!(
        frame.chars().any(|c| ('\u{2800}'..='\u{28ff}').contains(&c) && c != '\u{2800}'),
        "frame should contain a rasterized braille cell:\n{frame}"
    );
}

#[test]
fn repeated_draw_coalesces_cache_hits_not_refetches() {
    let fetcher = FixtureFetcher { bytes: fixture_tile_bytes(), calls: AtomicUsize::new(0) };
    let mut source = TileSource::with_fetcher(Box::new(fetcher), fixture_style(), "en".to_string(), 16, false);
    let (lon, lat) = vtmap::geo::tile2ll(0.5, 0.5, 10.0);
    let viewport = Viewport::new(lon, lat, 10.0, 32, 32, 256.0, 18.0, 0.5);
    let mut renderer = Renderer::new(32, 32, 256.0, "\u{25c9}".to_string(), 2.0);

    renderer.draw(&mut source, &viewport).unwrap();
    renderer.draw(&mut source, &viewport).unwrap();
    assert_eq!(source.len(), 1, "both draws should have hit the same cached tile");
}
