//! Line-oriented outputs.
//!
//! Every payload becomes one JSON line `{"output": name, "payload": {...}}`.

use async_trait::async_trait;
use serde_json::json;
use shared_types::{OutputSettings, RenderedScan};
use sr_06_dispatch::{Output, OutputError, OutputFactory};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::warn;

pub struct LineOutput<W> {
    name: String,
    writer: Mutex<W>,
}

impl LineOutput<Stdout> {
    pub fn stdout(name: &str) -> Self {
        Self::new(name, tokio::io::stdout())
    }
}

impl<W> LineOutput<W> {
    pub fn new(name: &str, writer: W) -> Self {
        Self {
            name: name.to_string(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn send_error(&self, e: impl ToString) -> OutputError {
        OutputError::Send {
            output: self.name.clone(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl<W> Output for LineOutput<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &RenderedScan) -> Result<(), OutputError> {
        let mut line = serde_json::to_vec(&json!({ "output": self.name, "payload": payload }))
            .map_err(|e| self.send_error(e))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.map_err(|e| self.send_error(e))?;
        writer.flush().await.map_err(|e| self.send_error(e))
    }

    async fn terminate(&self) -> Result<(), OutputError> {
        self.writer
            .lock()
            .await
            .flush()
            .await
            .map_err(|e| OutputError::Terminate {
                output: self.name.clone(),
                message: e.to_string(),
            })
    }
}

/// Builds a stdout output for every output setting.
///
/// Chat, ticketing and webhook clients are not bundled; outputs of those
/// types are written to stdout so the rest of the pipeline still runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinOutputFactory;

impl OutputFactory for BuiltinOutputFactory {
    fn build(&self, settings: &OutputSettings) -> Result<Arc<dyn Output>, OutputError> {
        if !matches!(settings.kind.as_str(), "" | "stdout") {
            warn!(
                "[relay] No client for output type {}, writing {} to stdout",
                settings.kind, settings.name
            );
        }
        Ok(Arc::new(LineOutput::stdout(&settings.name)))
    }
}
