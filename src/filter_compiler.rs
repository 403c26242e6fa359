//! pure `Expression -> String` renderer for the backend's secondary-index
//! query dialect
//!
//! renders into a RediSearch-like dialect: `@<field>:{<tag>}`,
//! `@<field>:[<lo> <hi>]`, `-<term>` (negation), `(a | b)` (disjunction),
//! juxtaposition (conjunction). the vector/keyword query tails are assembled
//! by the repository layer from `KnnQuery`/`Bm25Query`'s structured fields,
//! not by this module.

use crate::expr::{Bound, Condition, Expression};

/// punctuation and whitespace the dialect reserves; each byte is rendered
/// as a backslash escape.
const RESERVED: &[u8] = b",.<>{}[]\"':;!@#$%^&*()-+=~| \t\n";

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        if RESERVED.contains(&b) {
            out.push('\\');
        }
        out.push(b as char);
    }
    out
}

fn render_bound_low(bound: &Bound) -> String {
    match bound {
        Bound::Gt(v) => format!("({v}"),
        Bound::Gte(v) => format!("{v}"),
        // a `Bound` on the low side is always Gt/Gte; `Expression` enforces
        // this at construction, so the other arms are unreachable here.
        Bound::Lt(v) | Bound::Lte(v) => format!("{v}"),
    }
}

fn render_bound_high(bound: &Bound) -> String {
    match bound {
        Bound::Lt(v) => format!("({v}"),
        Bound::Lte(v) => format!("{v}"),
        Bound::Gt(v) | Bound::Gte(v) => format!("{v}"),
    }
}

fn render_condition(condition: &Condition) -> String {
    match condition {
        Condition::TagMatch { key, value } => format!("@{key}:{{{}}}", escape(value)),
        Condition::NumericRange { key, low, high } => {
            let lo = low.as_ref().map(render_bound_low).unwrap_or_else(|| "-inf".to_string());
            let hi = high.as_ref().map(render_bound_high).unwrap_or_else(|| "+inf".to_string());
            format!("@{key}:[{lo} {hi}]")
        }
    }
}

/// render only the structural filter (no vector/keyword tail). empty
/// expressions render to the empty string; the caller substitutes `*`.
pub fn compile(expression: &Expression) -> String {
    let mut parts: Vec<String> = Vec::new();

    for condition in expression.must() {
        parts.push(render_condition(condition));
    }

    if !expression.should().is_empty() {
        let group = expression
            .should()
            .iter()
            .map(render_condition)
            .collect::<Vec<_>>()
            .join(" | ");
        parts.push(format!("({group})"));
    }

    for condition in expression.must_not() {
        parts.push(format!("-{}", render_condition(condition)));
    }

    parts.join(" ")
}

/// non-empty filter or `*` for "match everything"
pub fn compile_or_wildcard(expression: &Expression) -> String {
    let rendered = compile(expression);
    if rendered.is_empty() {
        "*".to_string()
    } else {
        rendered
    }
}
