//! Text building blocks of the pipe protocol.

use pl_common::Value;
use std::fmt::Write as _;

/// Quote character of the CSV dialect.
pub const QUOTE: char = '"';

/// Append `s` wrapped in `"`, doubling every embedded `"`.
pub fn push_quoted(out: &mut String, s: &str) {
    out.push(QUOTE);
    if s.contains(QUOTE) {
        for c in s.chars() {
            if c == QUOTE {
                out.push(QUOTE);
            }
            out.push(c);
        }
    } else {
        out.push_str(s);
    }
    out.push(QUOTE);
}

/// Append the store array literal for `items`, e.g. `['a','b\'c',NULL]`.
pub fn push_array_literal(out: &mut String, items: &[Value]) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_element(out, item);
    }
    out.push(']');
}

fn push_element(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(b) => out.push(if *b { '1' } else { '0' }),
        Value::String(s) | Value::Date(s) | Value::DateTime(s) => {
            out.push('\'');
            push_escaped(out, s);
            out.push('\'');
        }
        Value::Array(items) => push_array_literal(out, items),
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Decimal(_) => {
            let _ = write!(out, "{}", value);
        }
    }
}

/// Backslash escaping used inside single-quoted store literals.
fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            other => out.push(other),
        }
    }
}
