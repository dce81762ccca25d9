//! # Relay Configuration
//!
//! Runtime configuration read from the environment.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `RELAY_CONFIG_PATH` | tenant settings JSON file; absent means the stored snapshot |
//! | `RELAY_DB_PATH` | embedded store directory |
//! | `RELAY_DATABASE_URL` | relational store URL, wins over the path |
//! | `RELAY_TENANT` | tenant name, defaults to the settings document name |
//! | `RELAY_QUEUE_CAPACITY` | intake queue bound |

use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use shared_types::TenantSettings;
use sr_01_persistence::StorageConfig;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
pub const ENV_DB_PATH: &str = "RELAY_DB_PATH";
pub const ENV_DATABASE_URL: &str = "RELAY_DATABASE_URL";
pub const ENV_TENANT: &str = "RELAY_TENANT";
pub const ENV_QUEUE_CAPACITY: &str = "RELAY_QUEUE_CAPACITY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },

    #[error("Cannot read settings file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub storage: StorageConfig,
    /// Tenant settings document. `None` loads the snapshot kept in the store.
    pub settings_path: Option<PathBuf>,
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            settings_path: None,
            queue_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let queue_capacity = match get(ENV_QUEUE_CAPACITY) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: ENV_QUEUE_CAPACITY,
                        value: raw,
                    })
                }
            },
            None => DEFAULT_CHANNEL_CAPACITY,
        };

        Ok(Self {
            storage: StorageConfig::new(
                get(ENV_DB_PATH).unwrap_or_default(),
                get(ENV_DATABASE_URL),
                get(ENV_TENANT),
            ),
            settings_path: get(ENV_CONFIG_PATH).map(PathBuf::from),
            queue_capacity,
        })
    }

    /// Embedded store at `path`, settings from the store.
    pub fn for_testing(path: impl Into<String>) -> Self {
        let mut storage = StorageConfig::new(path, None, None);
        storage.relaxed_sync = true;
        Self {
            storage,
            ..Self::default()
        }
    }

    /// Read the settings file, if one is configured.
    pub fn load_settings(&self) -> Result<Option<TenantSettings>, ConfigError> {
        let Some(path) = &self.settings_path else {
            return Ok(None);
        };
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })
    }
}
