//! # Error Types
//!
//! Storage and setup errors for the persistence subsystem.

use thiserror::Error;

/// Errors from a persistence backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be opened or connected to.
    #[error("Failed to open store: {message}")]
    Open { message: String },

    /// A read or write against the backend failed.
    #[error("Storage I/O error: {message}")]
    Io { message: String },

    /// The provider was closed; no further operations are accepted.
    #[error("Store is closed")]
    Closed,

    /// A stored value has an unexpected shape.
    #[error("Corrupt value in {bucket}/{key}: {message}")]
    Corrupt {
        bucket: &'static str,
        key: String,
        message: String,
    },

    /// A required key is absent.
    #[error("Key not found: {bucket}/{key}")]
    NotFound { bucket: &'static str, key: String },
}

impl StoreError {
    pub fn io(message: impl Into<String>) -> Self {
        StoreError::Io {
            message: message.into(),
        }
    }
}

/// Errors from [`crate::setup::configure_storage`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    /// A database URL was given without a tenant identifier.
    #[error("A tenant name is required when a database URL is configured")]
    MissingTenant,

    /// The selected backend failed to open.
    #[error("Storage setup failed: {0}")]
    Open(#[from] StoreError),
}
