use criterion::{criterion_group, criterion_main, Criterion};
use vtmap::braille::Canvas;
use vtmap::geo;
use vtmap::style::{compile_filter, Styler};
use vtmap::value::{Properties, Value};

fn frame_serialization(c: &mut Criterion) {
    c.bench_function("braille_frame_160x80", |b| {
        let mut canvas = Canvas::new(160, 80);
        for y in 0..80i64 {
            for x in (0..160i64).step_by(3) {
                canvas.line(x, y, x + 2, y, ((x + y) % 230) as u8, 1.0);
            }
        }
        b.iter(|| canvas.frame());
    });
}

fn triangle_fill(c: &mut Criterion) {
    c.bench_function("polygon_fill_40x40", |b| {
        let mut canvas = Canvas::new(64, 64);
        let rings = vec![vec![(2, 2), (60, 8), (40, 60), (10, 40)]];
        b.iter(|| canvas.polygon(&rings, 34));
    });
}

fn filter_eval(c: &mut Criterion) {
    let filter = compile_filter(&serde_json::json!([
        "all",
        ["==", "class", "motorway"],
        [">=", "rank", 3],
        ["!in", "brunnel", "bridge", "tunnel"]
    ]));
    let mut props: Properties = Properties::new();
    props.insert("class".into(), Value::Str("motorway".into()));
    props.insert("rank".into(), Value::Num(4.0));
    props.insert("brunnel".into(), Value::Str("surface".into()));

    c.bench_function("style_filter_eval", |b| {
        b.iter(|| filter.eval(&props));
    });
}

fn tile_coord_math(c: &mut Criterion) {
    c.bench_function("ll2tile_tile2ll_roundtrip", |b| {
        b.iter(|| {
            let (tx, ty) = geo::ll2tile(13.42012, 52.51298, 14.0);
            geo::tile2ll(tx, ty, 14.0)
        });
    });
}

fn style_compile(c: &mut Criterion) {
    let doc = serde_json::json!({
        "constants": {"@land-color": "#f2efe9"},
        "layers": [
            {"id": "background", "type": "background", "paint": {"background-color": "@land-color"}},
            {"id": "water", "type": "fill", "source-layer": "water", "paint": {"fill-color": "#a0c8f0"}},
            {"id": "roads", "type": "line", "source-layer": "road", "filter": ["==", "class", "motorway"], "paint": {"line-color": "#fff", "line-width": 2.0}},
            {"id": "roads-case", "ref": "roads", "paint": {"line-color": "#ccc"}},
            {"id": "labels", "type": "symbol", "source-layer": "place_label", "paint": {"text-color": "#333"}}
        ]
    })
    .to_string();

    c.bench_function("styler_compile", |b| {
        b.iter(|| Styler::from_str(&doc).unwrap());
    });
}

criterion_group!(benches, frame_serialization, triangle_fill, filter_eval, tile_coord_math, style_compile);
criterion_main!(benches);
