//! # Ports
//!
//! Capabilities the dispatcher consumes but does not implement. The runtime
//! plugs in concrete sinks, a renderer and a policy; tests plug in doubles.

use crate::error::{OutputError, RenderError};
use async_trait::async_trait;
use shared_types::{OutputSettings, RenderedScan, Route, ScanMessage, TemplateSettings};
use std::sync::Arc;

/// A delivery sink (chat, ticketing, webhook, ...).
#[async_trait]
pub trait Output: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, payload: &RenderedScan) -> Result<(), OutputError>;

    /// Release sink resources. Called once when the output is removed or
    /// the router shuts down.
    async fn terminate(&self) -> Result<(), OutputError>;
}

/// Builds sinks from their settings when an output is registered.
pub trait OutputFactory: Send + Sync {
    fn build(&self, settings: &OutputSettings) -> Result<Arc<dyn Output>, OutputError>;
}

/// Turns messages into rendered payloads.
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        template: &TemplateSettings,
        message: &ScanMessage,
    ) -> Result<RenderedScan, RenderError>;

    /// Render a digest of already rendered entries (newest first).
    fn render_batch(
        &self,
        template: &TemplateSettings,
        entries: &[RenderedScan],
    ) -> Result<RenderedScan, RenderError>;
}

/// Decides whether a route accepts a message.
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(&self, route: &Route, message: &ScanMessage) -> bool;
}

/// Per-route pre-filter run before the policy. Returning `false` drops the
/// message for that route.
pub type InputCallback = Arc<dyn Fn(&ScanMessage) -> bool + Send + Sync>;

/// Accepts every message on every route.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl PolicyEvaluator for AcceptAll {
    fn evaluate(&self, _route: &Route, _message: &ScanMessage) -> bool {
        true
    }
}
