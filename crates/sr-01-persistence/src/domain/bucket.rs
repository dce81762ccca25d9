//! Logical partitions of the store.

use std::fmt;

/// A logical partition. Column family on RocksDB, `bucket` column on SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// fingerprint -> first payload seen
    Messages,
    /// `{timestamp}#{fingerprint}` -> fingerprint
    Expiry,
    /// `{route}/{output}` -> serialized batch
    Aggregation,
    /// output name -> invocation count
    Counters,
    /// API key and settings snapshot
    SharedConfig,
}

impl Bucket {
    pub const ALL: [Bucket; 5] = [
        Bucket::Messages,
        Bucket::Expiry,
        Bucket::Aggregation,
        Bucket::Counters,
        Bucket::SharedConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Messages => "messages",
            Bucket::Expiry => "expiry",
            Bucket::Aggregation => "aggregation",
            Bucket::Counters => "counters",
            Bucket::SharedConfig => "shared_config",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
