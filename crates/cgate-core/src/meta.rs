// SPDX-License-Identifier: MIT OR Apache-2.0
//! Coercion helpers for polymorphic result metadata.
//!
//! Rule engines hand back untyped values: a `collections` entry can be a
//! string, a list of strings, or garbage. These helpers read the shapes the
//! pipeline recognizes and return `None` for everything else.

use crate::Metadata;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Read `key` as a string slice.
#[must_use]
pub fn as_str<'a>(meta: &'a Metadata, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(Value::as_str)
}

/// Read `key` as a list of strings.
///
/// A scalar string becomes a singleton list. A list qualifies only when
/// every element is a string; mixed lists and other shapes yield `None`.
#[must_use]
pub fn string_list(meta: &Metadata, key: &str) -> Option<Vec<String>> {
    meta.get(key).and_then(coerce_string_list)
}

/// Coerce a raw metadata value into a list of strings, if it has that shape.
#[must_use]
pub fn coerce_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// Read `key` as an RFC 3339 timestamp.
///
/// Non-string and unparseable values yield `None`; callers treat that the
/// same as the key being absent.
#[must_use]
pub fn time(meta: &Metadata, key: &str) -> Option<DateTime<Utc>> {
    let raw = as_str(meta, key)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn string_list_accepts_scalar_and_list() {
        let m = meta(&[
            ("scalar", json!("one")),
            ("list", json!(["a", "b"])),
        ]);
        assert_eq!(string_list(&m, "scalar"), Some(vec!["one".to_string()]));
        assert_eq!(
            string_list(&m, "list"),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn string_list_rejects_mixed_and_other_shapes() {
        let m = meta(&[
            ("mixed", json!(["a", 1])),
            ("number", json!(42)),
            ("object", json!({"a": 1})),
        ]);
        assert_eq!(string_list(&m, "mixed"), None);
        assert_eq!(string_list(&m, "number"), None);
        assert_eq!(string_list(&m, "object"), None);
        assert_eq!(string_list(&m, "missing"), None);
    }

    #[test]
    fn string_list_empty_list_is_empty() {
        let m = meta(&[("empty", json!([]))]);
        assert_eq!(string_list(&m, "empty"), Some(Vec::new()));
    }

    #[test]
    fn time_parses_rfc3339() {
        let m = meta(&[("effective_on", json!("2022-01-01T00:00:00Z"))]);
        let t = time(&m, "effective_on").expect("parse timestamp");
        assert_eq!(t.to_rfc3339(), "2022-01-01T00:00:00+00:00");
    }

    #[test]
    fn time_offset_is_normalized_to_utc() {
        let m = meta(&[("effective_on", json!("2022-01-01T02:00:00+02:00"))]);
        let t = time(&m, "effective_on").expect("parse timestamp");
        assert_eq!(t.to_rfc3339(), "2022-01-01T00:00:00+00:00");
    }

    #[test]
    fn time_rejects_garbage() {
        let m = meta(&[
            ("not_a_time", json!("next tuesday")),
            ("not_a_string", json!(20220101)),
        ]);
        assert_eq!(time(&m, "not_a_time"), None);
        assert_eq!(time(&m, "not_a_string"), None);
    }
}
