//! # Inbound Messages
//!
//! Scan results arrive as raw bytes and are parsed into a JSON object once per
//! dispatch. Rendered output entries are flat string maps.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::errors::MessageError;

/// A parsed inbound scan result.
pub type ScanMessage = Map<String, Value>;

/// A rendered scan entry (title, description, url, ...) as produced by a
/// template and accumulated by the aggregation engine.
pub type RenderedScan = BTreeMap<String, String>;

/// Replace backticks with single quotes.
///
/// Scanners embed shell snippets in descriptions; backticks break several
/// downstream template engines, so intake normalizes them before parsing.
pub fn sanitize_raw(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .map(|b| if *b == b'`' { b'\'' } else { *b })
        .collect()
}

/// Parse raw bytes into a [`ScanMessage`].
pub fn parse_message(raw: &[u8]) -> Result<ScanMessage, MessageError> {
    let value: Value =
        serde_json::from_slice(raw).map_err(|e| MessageError::Malformed(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(MessageError::NotAnObject { kind: "null" }),
        Value::Bool(_) => Err(MessageError::NotAnObject { kind: "bool" }),
        Value::Number(_) => Err(MessageError::NotAnObject { kind: "number" }),
        Value::String(_) => Err(MessageError::NotAnObject { kind: "string" }),
        Value::Array(_) => Err(MessageError::NotAnObject { kind: "array" }),
    }
}

/// Look up a field by dotted path (`vulnerability_summary.critical`).
///
/// A path segment that is not found at the top level is first tried as a
/// literal key, so keys that themselves contain dots still resolve.
pub fn lookup_path<'a>(message: &'a ScanMessage, path: &str) -> Option<&'a Value> {
    if let Some(value) = message.get(path) {
        return Some(value);
    }

    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = message.get(first)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_backticks() {
        let raw = br#"{"description":"run `ls`"}"#;
        let cleaned = sanitize_raw(raw);
        assert_eq!(cleaned, br#"{"description":"run 'ls'"}"#.to_vec());
    }

    #[test]
    fn test_parse_object() {
        let msg = parse_message(br#"{"image":"alpine:3.18","registry":"Docker Hub"}"#).unwrap();
        assert_eq!(msg.get("image").unwrap(), "alpine:3.18");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert_eq!(
            parse_message(b"[1,2]").unwrap_err(),
            MessageError::NotAnObject { kind: "array" }
        );
        assert!(matches!(
            parse_message(b"{not json"),
            Err(MessageError::Malformed(_))
        ));
    }

    #[test]
    fn test_lookup_nested_path() {
        let msg = parse_message(
            br#"{"vulnerability_summary":{"critical":2,"high":5},"tags":["a","b"],"a.b":1}"#,
        )
        .unwrap();

        assert_eq!(
            lookup_path(&msg, "vulnerability_summary.critical").unwrap(),
            &serde_json::json!(2)
        );
        assert_eq!(lookup_path(&msg, "tags.1").unwrap(), "b");
        assert_eq!(lookup_path(&msg, "a.b").unwrap(), &serde_json::json!(1));
        assert!(lookup_path(&msg, "vulnerability_summary.low").is_none());
        assert!(lookup_path(&msg, "missing").is_none());
    }
}
