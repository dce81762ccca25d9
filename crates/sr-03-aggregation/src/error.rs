//! Aggregation error types.

use sr_01_persistence::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("Aggregation storage error: {0}")]
    Store(#[from] StoreError),

    /// The persisted batch for `key` could not be decoded or encoded.
    #[error("Aggregation batch {key} is not valid: {message}")]
    Serialization { key: String, message: String },
}
