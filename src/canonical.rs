//! Deterministic JSON encoding for hash verification
//!
//! Two encodings share one writer and differ only in how object keys are
//! emitted:
//!
//! - **Canonical** ([`canonicalize`]): keys sorted by byte-wise comparison at
//!   every nesting level. This is how the upstream signer hashes the
//!   *request* body.
//! - **Insertion order** ([`to_insertion_order_json`]): keys emitted in the
//!   order the value was built or parsed. This is how the upstream signer
//!   hashes the *response* body.
//!
//! Both are fixed external contracts and must not be merged into one form.
//!
//! ## Primitive rules
//!
//! The reference producer is a JavaScript `JSON.stringify`, so:
//! - No whitespace anywhere.
//! - Strings escape only `"`, `\`, and control characters below `U+0020`
//!   (`\b \f \n \r \t` by name, everything else as lowercase `\u00xx`).
//!   All other code points, including non-ASCII, are written as raw UTF-8.
//! - Integers are written plainly. Floats follow ECMAScript
//!   `Number::toString`: shortest round-trip digits, no trailing `.0` on
//!   integral values, decimal notation while the decimal exponent is in
//!   `[-7, 21)`, and `1e+21` style exponents outside it. `-0` is `0`.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyOrder {
    Sorted,
    Insertion,
}

/// Serialize a JSON value with sorted keys and no whitespace
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, KeyOrder::Sorted);
    out
}

/// Serialize a JSON value keeping object keys in insertion order
///
/// Uses the same number and string rules as [`canonicalize`].
pub fn to_insertion_order_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, KeyOrder::Insertion);
    out
}

/// Serialize any `Serialize` type to canonical JSON
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    Ok(canonicalize(&json))
}

/// Parse a JSON text strictly and return its canonical form
///
/// Duplicate object keys are rejected rather than silently collapsed.
pub fn canonicalize_str(text: &str) -> Result<String> {
    let value = parse_strict(text)?;
    Ok(canonicalize(&value))
}

/// Parse a JSON text, rejecting duplicate object keys at any depth
pub fn parse_strict(text: &str) -> Result<Value> {
    serde_json::from_str::<StrictValue>(text)
        .map(|v| v.0)
        .map_err(|e| Error::Canonical(e.to_string()))
}

fn write_value(out: &mut String, value: &Value, order: KeyOrder) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, order);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            if order == KeyOrder::Sorted {
                // str ordering is byte-wise over UTF-8
                entries.sort_by(|a, b| a.0.cmp(b.0));
            }

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item, order);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_number(out: &mut String, n: &Number) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        out.push_str(&format_float(f));
    } else {
        out.push_str(&n.to_string());
    }
}

/// Format a finite float the way ECMAScript `Number::toString` does
fn format_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }

    let sign = if f < 0.0 { "-" } else { "" };

    // LowerExp yields the shortest round-trip digits, e.g. "1.2345e3"
    let sci = format!("{:e}", f.abs());
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return format!("{}{}", sign, sci);
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return format!("{}{}", sign, sci);
    };

    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exp + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int_part, frac_part) = digits.split_at(n as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let e_sign = if e >= 0 { "+" } else { "-" };
        if k == 1 {
            format!("{}e{}{}", digits, e_sign, e.abs())
        } else {
            format!("{}.{}e{}{}", &digits[..1], &digits[1..], e_sign, e.abs())
        }
    };

    format!("{}{}", sign, body)
}

/// JSON value that refuses duplicate object keys while deserializing
struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StrictVisitor).map(StrictValue)
    }
}

struct StrictVisitor;

impl<'de> Visitor<'de> for StrictVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_u64<E>(self, v: u64) -> std::result::Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom("non-finite number"))
    }

    fn visit_str<E>(self, v: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> std::result::Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(StrictValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            if map.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key `{}`", key)));
            }
            let StrictValue(value) = access.next_value()?;
            map.insert(key, value);
        }
        Ok(Value::Object(map))
    }
}
