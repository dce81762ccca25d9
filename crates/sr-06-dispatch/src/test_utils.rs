//! Test doubles for outputs, rendering and policy.

use crate::error::{OutputError, RenderError};
use crate::ports::{Output, OutputFactory, PolicyEvaluator, Renderer};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::{OutputSettings, RenderedScan, Route, ScanMessage, TemplateSettings};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Output that records every payload it is asked to send.
pub struct RecordingOutput {
    name: String,
    sent: Mutex<Vec<RenderedScan>>,
    failing: AtomicBool,
    terminations: AtomicUsize,
}

impl RecordingOutput {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            terminations: AtomicUsize::new(0),
        })
    }

    /// An output whose every send fails.
    pub fn failing(name: &str) -> Arc<Self> {
        let output = Self::new(name);
        output.set_failing(true);
        output
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<RenderedScan> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Output for RecordingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &RenderedScan) -> Result<(), OutputError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(OutputError::Send {
                output: self.name.clone(),
                message: "sink unavailable".to_string(),
            });
        }
        self.sent.lock().push(payload.clone());
        Ok(())
    }

    async fn terminate(&self) -> Result<(), OutputError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builds [`RecordingOutput`]s and keeps a handle to each.
///
/// Settings with `"fail": true` produce a failing output; kind `"broken"`
/// cannot be built at all.
#[derive(Default)]
pub struct RecordingFactory {
    built: Mutex<HashMap<String, Arc<RecordingOutput>>>,
}

impl RecordingFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn output(&self, name: &str) -> Option<Arc<RecordingOutput>> {
        self.built.lock().get(name).cloned()
    }
}

impl OutputFactory for RecordingFactory {
    fn build(&self, settings: &OutputSettings) -> Result<Arc<dyn Output>, OutputError> {
        if settings.kind == "broken" {
            return Err(OutputError::Build {
                output: settings.name.clone(),
                kind: settings.kind.clone(),
                message: "unsupported".to_string(),
            });
        }
        let output = RecordingOutput::new(&settings.name);
        if settings.options.get("fail") == Some(&Value::Bool(true)) {
            output.set_failing(true);
        }
        self.built
            .lock()
            .insert(settings.name.clone(), Arc::clone(&output));
        Ok(output)
    }
}

/// Renders every top-level field as a string; batches become
/// `{count, entries, template}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldRenderer;

impl Renderer for FieldRenderer {
    fn render(
        &self,
        template: &TemplateSettings,
        message: &ScanMessage,
    ) -> Result<RenderedScan, RenderError> {
        let mut rendered: RenderedScan = message
            .iter()
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), text)
            })
            .collect();
        rendered.insert("template".to_string(), template.name.clone());
        Ok(rendered)
    }

    fn render_batch(
        &self,
        template: &TemplateSettings,
        entries: &[RenderedScan],
    ) -> Result<RenderedScan, RenderError> {
        let encoded = serde_json::to_string(entries).map_err(|e| RenderError::Template {
            template: template.name.clone(),
            message: e.to_string(),
        })?;
        Ok(RenderedScan::from([
            ("count".to_string(), entries.len().to_string()),
            ("entries".to_string(), encoded),
            ("template".to_string(), template.name.clone()),
        ]))
    }
}

/// Accepts a message when its `"source"` field equals the route input, or
/// when the route input is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourcePolicy;

impl PolicyEvaluator for SourcePolicy {
    fn evaluate(&self, route: &Route, message: &ScanMessage) -> bool {
        route.input.is_empty()
            || message.get("source").and_then(Value::as_str) == Some(route.input.as_str())
    }
}
