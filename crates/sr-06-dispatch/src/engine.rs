//! # Dispatch Engine
//!
//! Decides, for one message on one route output, whether to drop it as a
//! duplicate, send it now, or hand it to the aggregation buffer.
//!
//! ```text
//! message ──▶ fingerprint ──▶ may_be_store ──false──▶ Duplicate
//!                                  │ true
//!                                  ▼
//!                       render with output template
//!                                  │
//!              ┌───────────────────┴───────────────────┐
//!        no aggregation                          aggregation
//!              │                                       │
//!           send ──▶ Sent                 aggregate ──▶ None ──▶ Buffered
//!                                                      │
//!                                               Some(batch)
//!                                                      │
//!                                     render_batch + send ──▶ Flushed(n)
//! ```
//!
//! Every successful send bumps the output's invocation counter. A failing
//! counter update is logged; it never turns a delivered message into an
//! error.

use crate::context::DispatchContext;
use crate::error::DispatchError;
use crate::ports::Output;
use chrono::Utc;
use shared_types::{
    parse_message, sanitize_raw, MessageError, RenderedScan, Route, ScanMessage, TemplateSettings,
};
use sr_02_dedup::{dedup_key, expiry_for, message_fingerprint};
use sr_03_aggregation::aggregation_key;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A sanitized raw payload together with its parsed form.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub raw: Vec<u8>,
    pub message: ScanMessage,
}

impl InboundMessage {
    /// Replace backticks, then parse.
    pub fn parse(raw: &[u8]) -> Result<Self, MessageError> {
        let raw = sanitize_raw(raw);
        let message = parse_message(&raw)?;
        Ok(Self { raw, message })
    }
}

/// An output resolved together with the template it renders with.
#[derive(Clone)]
pub struct DispatchTarget {
    pub output: Arc<dyn Output>,
    pub template: TemplateSettings,
}

impl DispatchTarget {
    pub fn new(output: Arc<dyn Output>, template: TemplateSettings) -> Self {
        Self { output, template }
    }

    pub fn name(&self) -> &str {
        self.output.name()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Seen before within the dedup window; nothing sent.
    Duplicate,
    /// Sent immediately.
    Sent,
    /// Appended to the aggregation buffer.
    Buffered,
    /// Completed a batch of this many entries, which was sent.
    Flushed(usize),
}

pub struct DispatchEngine {
    ctx: Arc<DispatchContext>,
}

impl DispatchEngine {
    pub fn new(ctx: Arc<DispatchContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<DispatchContext> {
        &self.ctx
    }

    /// Run the dedup and aggregation decision for one route output.
    pub async fn dispatch(
        &self,
        inbound: &InboundMessage,
        route: &Route,
        target: &DispatchTarget,
    ) -> Result<DispatchOutcome, DispatchError> {
        let fingerprint = message_fingerprint(&inbound.message, &route.plugins.unique_message_props);
        let key = dedup_key(&route.name, target.name(), &fingerprint);
        let expires_at = expiry_for(Utc::now(), route.plugins.unique_message_timeout_seconds);

        if !self.ctx.dedup.may_be_store(&key, &inbound.raw, expires_at).await? {
            debug!(
                "[sr-06] Duplicate on route {} output {}, skipping",
                route.name,
                target.name()
            );
            return Ok(DispatchOutcome::Duplicate);
        }

        let entry = self.ctx.renderer.render(&target.template, &inbound.message)?;

        let aggregation = route.aggregation();
        if !aggregation.is_enabled() {
            self.deliver(target, &entry).await?;
            return Ok(DispatchOutcome::Sent);
        }

        let batch = self
            .ctx
            .aggregation
            .aggregate(
                &aggregation_key(&route.name, target.name()),
                Some(entry),
                aggregation.capacity,
                aggregation.ignore_quantity(),
            )
            .await?;

        match batch {
            Some(batch) => {
                self.deliver_batch(target, &batch).await?;
                Ok(DispatchOutcome::Flushed(batch.len()))
            }
            None => Ok(DispatchOutcome::Buffered),
        }
    }

    /// Render and send without dedup or buffering.
    pub async fn send_direct(
        &self,
        message: &ScanMessage,
        target: &DispatchTarget,
    ) -> Result<(), DispatchError> {
        let payload = self.ctx.renderer.render(&target.template, message)?;
        self.deliver(target, &payload).await
    }

    /// Send whatever is buffered for `route` on this output.
    ///
    /// Returns the number of entries sent (0 when the buffer was empty).
    pub async fn flush(&self, route: &str, target: &DispatchTarget) -> Result<usize, DispatchError> {
        let key = aggregation_key(route, target.name());
        let Some(batch) = self.ctx.aggregation.flush(&key).await? else {
            return Ok(0);
        };
        self.deliver_batch(target, &batch).await?;
        info!(
            "[sr-06] Flushed {} entries on route {} to {}",
            batch.len(),
            route,
            target.name()
        );
        Ok(batch.len())
    }

    async fn deliver_batch(
        &self,
        target: &DispatchTarget,
        batch: &[RenderedScan],
    ) -> Result<(), DispatchError> {
        let payload = self.ctx.renderer.render_batch(&target.template, batch)?;
        self.deliver(target, &payload).await
    }

    async fn deliver(
        &self,
        target: &DispatchTarget,
        payload: &RenderedScan,
    ) -> Result<(), DispatchError> {
        target.output.send(payload).await?;
        if let Err(e) = self.ctx.bookkeeping.register_invocation(target.name()).await {
            warn!(
                "[sr-06] Could not count invocation of {}: {}",
                target.name(),
                e
            );
        }
        Ok(())
    }
}
