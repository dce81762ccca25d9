//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors raised while parsing an inbound message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    /// Payload is not valid JSON.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Payload is valid JSON but not an object.
    #[error("Message must be a JSON object, got {kind}")]
    NotAnObject { kind: &'static str },
}

/// Errors raised while normalizing route settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// Timeout string could not be parsed.
    #[error("Invalid timeout {value:?}: {reason}")]
    InvalidTimeout { value: String, reason: &'static str },
}
