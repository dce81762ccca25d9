//! # TTL Key Encoding
//!
//! Expiry keys sort lexicographically in chronological order: fixed-width UTC
//! timestamps with nanosecond precision, followed by `#` and the fingerprint
//! so two records expiring in the same nanosecond never collide.
//!
//! A sweep at `now` deletes every key `<= "{now}~"`. `~` sorts after `#` and
//! after every character a fingerprint can contain, so records expiring
//! exactly at `now` are included.

use chrono::{DateTime, Utc};

/// `2024-01-02T03:04:05.000000006Z`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

const KEY_SEPARATOR: char = '#';
const BOUND_SUFFIX: char = '~';

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Key of the expiry entry mirroring `fingerprint`.
pub fn expiry_key(expires_at: DateTime<Utc>, fingerprint: &str) -> String {
    format!("{}{KEY_SEPARATOR}{fingerprint}", format_timestamp(expires_at))
}

/// Inclusive upper bound for an expiry sweep at `now`.
pub fn sweep_bound(now: DateTime<Utc>) -> String {
    format!("{}{BOUND_SUFFIX}", format_timestamp(now))
}
