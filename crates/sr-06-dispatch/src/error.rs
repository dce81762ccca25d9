//! # Dispatch Errors

use shared_types::{MessageError, SettingsError};
use sr_01_persistence::StoreError;
use sr_03_aggregation::AggregationError;
use thiserror::Error;

/// Failure of a single output sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutputError {
    #[error("Output {output} failed to send: {message}")]
    Send { output: String, message: String },

    #[error("Output {output} failed to terminate: {message}")]
    Terminate { output: String, message: String },

    #[error("Cannot build output {output} of type {kind}: {message}")]
    Build {
        output: String,
        kind: String,
        message: String,
    },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Template {template} failed to render: {message}")]
    Template { template: String, message: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Output not found: {0}")]
    OutputNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The retry path reached at least one output that did not accept the
    /// message.
    #[error("Route {route} failed to deliver to: {}", .outputs.join(", "))]
    OutputsFailed { route: String, outputs: Vec<String> },

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
