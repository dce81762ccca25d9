//! # Message Fingerprints
//!
//! A fingerprint is the hex SHA-256 of a canonical rendering of the
//! configured unique properties, or of the whole message when none are
//! configured. Property order in the route settings never matters.

use serde_json::Value;
use sha2::{Digest, Sha256};
use shared_types::{lookup_path, ScanMessage};

/// Fingerprint of `message` under the given unique property paths.
///
/// Missing properties contribute `null`, so two messages that both lack a
/// property still match on it.
pub fn message_fingerprint(message: &ScanMessage, unique_props: &[String]) -> String {
    let mut hasher = Sha256::new();

    if unique_props.is_empty() {
        // serde_json maps are key-sorted, so this rendering is canonical.
        hasher.update(Value::Object(message.clone()).to_string().as_bytes());
        return hex::encode(hasher.finalize());
    }

    let mut props: Vec<&str> = unique_props.iter().map(String::as_str).collect();
    props.sort_unstable();
    props.dedup();

    for prop in props {
        let value = lookup_path(message, prop).unwrap_or(&Value::Null);
        hasher.update(prop.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
        hasher.update(b";");
    }
    hex::encode(hasher.finalize())
}

/// Dedup record key: a fingerprint scoped to one route output, so the same
/// message still reaches every output once.
pub fn dedup_key(route: &str, output: &str, fingerprint: &str) -> String {
    format!("{route}/{output}/{fingerprint}")
}
