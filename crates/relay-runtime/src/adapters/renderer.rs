//! Placeholder renderer.
//!
//! A template body such as `"{{image}}: {{vulnerability_summary.critical}} critical"`
//! has every `{{path}}` replaced with the message value at that dotted path.
//! Missing paths render empty. An empty body renders every top-level field
//! as its own entry instead.

use serde_json::Value;
use shared_types::{lookup_path, RenderedScan, ScanMessage, TemplateSettings};
use sr_06_dispatch::{RenderError, Renderer};

pub const TEXT_KEY: &str = "text";
pub const TEMPLATE_KEY: &str = "template";
pub const COUNT_KEY: &str = "count";

#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl Renderer for TemplateRenderer {
    fn render(
        &self,
        template: &TemplateSettings,
        message: &ScanMessage,
    ) -> Result<RenderedScan, RenderError> {
        let mut rendered = if template.body.is_empty() {
            message
                .iter()
                .map(|(key, value)| (key.clone(), value_text(value)))
                .collect()
        } else {
            RenderedScan::from([(TEXT_KEY.to_string(), substitute(template, message)?)])
        };
        rendered.insert(TEMPLATE_KEY.to_string(), template.name.clone());
        Ok(rendered)
    }

    fn render_batch(
        &self,
        template: &TemplateSettings,
        entries: &[RenderedScan],
    ) -> Result<RenderedScan, RenderError> {
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.get(TEXT_KEY) {
                Some(text) => lines.push(text.clone()),
                None => lines.push(serde_json::to_string(entry).map_err(|e| {
                    RenderError::Template {
                        template: template.name.clone(),
                        message: e.to_string(),
                    }
                })?),
            }
        }

        Ok(RenderedScan::from([
            (TEMPLATE_KEY.to_string(), template.name.clone()),
            (COUNT_KEY.to_string(), entries.len().to_string()),
            (TEXT_KEY.to_string(), lines.join("\n")),
        ]))
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn substitute(template: &TemplateSettings, message: &ScanMessage) -> Result<String, RenderError> {
    let body = template.body.as_str();
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| RenderError::Template {
            template: template.name.clone(),
            message: format!("unclosed placeholder at byte {}", body.len() - rest.len() + start),
        })?;
        let path = after[..end].trim();
        if let Some(value) = lookup_path(message, path) {
            out.push_str(&value_text(value));
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
