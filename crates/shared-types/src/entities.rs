//! # Core Domain Entities
//!
//! Routes, plugin settings, outputs, templates and the tenant settings
//! document that ties them together.
//!
//! ## Timeouts
//!
//! Plugin timeouts may be configured either as seconds or as duration strings
//! (`"10s"`, `"5m"`, `"2h"`, `"1d"`). [`Route::configure_timeouts`] normalizes
//! strings into the `*_seconds` fields when a route is activated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SettingsError;

/// Template used when a route names none.
pub const DEFAULT_TEMPLATE: &str = "raw";

/// Per-route dedup and aggregation knobs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePlugins {
    /// Flush a batch once this many entries are buffered (0 = on first).
    pub aggregate_message_number: usize,
    /// Duration string form of `aggregate_timeout_seconds`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub aggregate_message_timeout: String,
    /// Timer flush interval (0 = no timer).
    pub aggregate_timeout_seconds: u64,
    /// Dotted property paths contributing to the message fingerprint.
    pub unique_message_props: Vec<String>,
    /// Duration string form of `unique_message_timeout_seconds`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub unique_message_timeout: String,
    /// Dedup window (0 = records never expire).
    pub unique_message_timeout_seconds: u64,
}

/// Aggregation settings derived from [`RoutePlugins`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationSettings {
    pub capacity: usize,
    pub interval_seconds: u64,
}

impl AggregationSettings {
    /// Both knobs zero means messages are sent immediately.
    pub fn is_enabled(&self) -> bool {
        self.capacity > 0 || self.interval_seconds > 0
    }

    /// Count-triggered flushes are suppressed for purely time-based routes.
    pub fn ignore_quantity(&self) -> bool {
        self.capacity == 0 && self.interval_seconds > 0
    }

    pub fn has_timer(&self) -> bool {
        self.interval_seconds > 0
    }
}

/// An input route: which messages go to which outputs, rendered how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub name: String,
    /// Input selector consumed by the policy evaluator.
    pub input: String,
    pub outputs: Vec<String>,
    pub template: String,
    pub plugins: RoutePlugins,
}

impl Route {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn aggregation(&self) -> AggregationSettings {
        AggregationSettings {
            capacity: self.plugins.aggregate_message_number,
            interval_seconds: self.plugins.aggregate_timeout_seconds,
        }
    }

    /// Fill the `*_seconds` fields from their string forms.
    ///
    /// A non-empty string always wins over a numeric value so settings
    /// documents written by older tooling keep their meaning.
    pub fn configure_timeouts(mut self) -> Result<Self, SettingsError> {
        if !self.plugins.aggregate_message_timeout.is_empty() {
            self.plugins.aggregate_timeout_seconds =
                parse_timeout(&self.plugins.aggregate_message_timeout)?;
        }
        if !self.plugins.unique_message_timeout.is_empty() {
            self.plugins.unique_message_timeout_seconds =
                parse_timeout(&self.plugins.unique_message_timeout)?;
        }
        Ok(self)
    }

    pub fn has_output(&self, output: &str) -> bool {
        self.outputs.iter().any(|o| o == output)
    }

    pub fn remove_output(&mut self, output: &str) {
        self.outputs.retain(|o| o != output);
    }
}

/// Parse `"<n>[s|m|h|d]"` into seconds. A bare number is seconds.
pub fn parse_timeout(value: &str) -> Result<u64, SettingsError> {
    let trimmed = value.trim();
    let invalid = |reason| SettingsError::InvalidTimeout {
        value: value.to_string(),
        reason,
    };

    let (digits, multiplier) = match trimmed.chars().last() {
        Some('s') => (&trimmed[..trimmed.len() - 1], 1),
        Some('m') => (&trimmed[..trimmed.len() - 1], 60),
        Some('h') => (&trimmed[..trimmed.len() - 1], 3_600),
        Some('d') => (&trimmed[..trimmed.len() - 1], 86_400),
        Some(c) if c.is_ascii_digit() => (trimmed, 1),
        Some(_) => return Err(invalid("unknown unit")),
        None => return Err(invalid("empty")),
    };

    let amount: u64 = digits
        .trim()
        .parse()
        .map_err(|_| invalid("not a number"))?;
    amount
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("overflow"))
}

/// Output sink configuration.
///
/// Sink-specific options (webhook URL, channel, credentials) are carried
/// opaquely in `options` and interpreted by the output factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// Template override applied to every route sending to this output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

fn default_enable() -> bool {
    true
}

/// A named template body handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub name: String,
    pub body: String,
}

/// The full settings document for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantSettings {
    pub name: String,
    /// Size cap for the dedup bucket in bytes (0 = unbounded).
    pub db_max_size: u64,
    /// Reaper interval in hours (0 = every hour).
    pub db_test_interval: u64,
    #[serde(rename = "routes")]
    pub input_routes: Vec<Route>,
    pub outputs: Vec<OutputSettings>,
    pub templates: Vec<TemplateSettings>,
}

impl TenantSettings {
    pub fn sweep_interval_hours(&self) -> u64 {
        if self.db_test_interval == 0 {
            1
        } else {
            self.db_test_interval
        }
    }
}
