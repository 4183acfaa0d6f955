//! Compiled Mapbox-style filter predicates: a tagged sum over the nine
//! filter forms plus a "default-true" variant for malformed/absent input.

use crate::value::{Properties, Value};

#[derive(Clone, Debug)]
pub enum Filter {
    All(Vec<Filter>),
    Any(Vec<Filter>),
    /// NOR: true iff none of the sub-filters match.
    None(Vec<Filter>),
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    Has(String),
    NotHas(String),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    /// Absent, unknown, or malformed filter: degrades to "always true" so
    /// rendering still completes (the `StylerCompile` error kind).
    Always,
}

impl Filter {
    pub fn eval(&self, props: &Properties) -> bool {
        match self {
            // Correct AND semantics: every sub-filter must pass. (The
            // upstream JS implementation this is modeled on inverts this —
            // returning true as soon as any sub-filter *fails* — which is
            // a known defect; this implementation does not reproduce it.)
            Filter::All(fs) => fs.iter().all(|f| f.eval(props)),
            Filter::Any(fs) => fs.iter().any(|f| f.eval(props)),
            Filter::None(fs) => !fs.iter().any(|f| f.eval(props)),
            Filter::Eq(k, v) => props.get(k) == Some(v),
            Filter::Ne(k, v) => props.get(k) != Some(v),
            Filter::In(k, vs) => props.get(k).is_some_and(|v| vs.contains(v)),
            Filter::NotIn(k, vs) => !props.get(k).is_some_and(|v| vs.contains(v)),
            Filter::Has(k) => props.get(k).is_some_and(Value::truthy),
            Filter::NotHas(k) => !props.get(k).is_some_and(Value::truthy),
            Filter::Lt(k, v) => numeric_cmp(props, k, v, |a, b| a < b),
            Filter::Lte(k, v) => numeric_cmp(props, k, v, |a, b| a <= b),
            Filter::Gt(k, v) => numeric_cmp(props, k, v, |a, b| a > b),
            Filter::Gte(k, v) => numeric_cmp(props, k, v, |a, b| a >= b),
            Filter::Always => true,
        }
    }
}

fn numeric_cmp(props: &Properties, key: &str, rhs: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (props.get(key).and_then(Value::as_f64), rhs.as_f64()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Compile a raw JSON filter expression into a [`Filter`]. Any shape that
/// doesn't match one of the nine known forms compiles to `Filter::Always`
/// rather than erroring — the `StylerCompile` error kind degrades in
/// place.
pub fn compile_filter(json: &serde_json::Value) -> Filter {
    let Some(arr) = json.as_array() else {
        return Filter::Always;
    };
    let Some(op) = arr.first().and_then(|v| v.as_str()) else {
        return Filter::Always;
    };

    let sub_filters = || arr[1..].iter().map(compile_filter).collect::<Vec<_>>();
    let key = |i: usize| arr.get(i).and_then(|v| v.as_str()).map(str::to_string);
    let val = |i: usize| arr.get(i).and_then(Value::from_json);
    let vals = |from: usize| -> Vec<Value> { arr[from.min(arr.len())..].iter().filter_map(Value::from_json).collect() };

    match op {
        "all" => Filter::All(sub_filters()),
        "any" => Filter::Any(sub_filters()),
        "none" => Filter::None(sub_filters()),
        "==" => match (key(1), val(2)) {
            (Some(k), Some(v)) => Filter::Eq(k, v),
            _ => Filter::Always,
        },
        "!=" => match (key(1), val(2)) {
            (Some(k), Some(v)) => Filter::Ne(k, v),
            _ => Filter::Always,
        },
        "in" => match key(1) {
            Some(k) => Filter::In(k, vals(2)),
            None => Filter::Always,
        },
        "!in" => match key(1) {
            Some(k) => Filter::NotIn(k, vals(2)),
            None => Filter::Always,
        },
        "has" => match key(1) {
            Some(k) => Filter::Has(k),
            None => Filter::Always,
        },
        "!has" => match key(1) {
            Some(k) => Filter::NotHas(k),
            None => Filter::Always,
        },
        "<" => match (key(1), val(2)) {
            (Some(k), Some(v)) => Filter::Lt(k, v),
            _ => Filter::Always,
        },
        "<=" => match (key(1), val(2)) {
            (Some(k), Some(v)) => Filter::Lte(k, v),
            _ => Filter::Always,
        },
        ">" => match (key(1), val(2)) {
            (Some(k), Some(v)) => Filter::Gt(k, v),
            _ => Filter::Always,
        },
        ">=" => match (key(1), val(2)) {
            (Some(k), Some(v)) => Filter::Gte(k, v),
            _ => Filter::Always,
        },
        _ => Filter::Always,
    }
}
