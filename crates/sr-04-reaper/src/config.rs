//! Retention configuration.

use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3_600);

/// Longest sweep interval, in hours (ten years).
const MAX_INTERVAL_HOURS: u32 = 10 * 365 * 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Byte limit for the dedup bucket (0 = unbounded).
    pub size_limit: u64,
    /// Time between sweeps.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            size_limit: 0,
            sweep_interval: HOUR,
        }
    }
}

impl RetentionConfig {
    /// Build from tenant settings: limit in bytes, interval in hours (0 = 1,
    /// capped at ten years).
    pub fn from_settings(db_max_size: u64, db_test_interval_hours: u64) -> Self {
        let hours = u32::try_from(db_test_interval_hours)
            .unwrap_or(u32::MAX)
            .clamp(1, MAX_INTERVAL_HOURS);
        Self {
            size_limit: db_max_size,
            sweep_interval: HOUR * hours,
        }
    }

    pub fn for_testing(size_limit: u64) -> Self {
        Self {
            size_limit,
            sweep_interval: Duration::from_millis(100),
        }
    }
}
