//! # Storage Setup
//!
//! Selects and opens exactly one provider. A database URL wins over an
//! embedded path; the relational backend needs a tenant name, which is
//! checked before any connection attempt.

use crate::domain::SetupError;
use crate::ports::PersistenceProvider;
use std::sync::Arc;
use tracing::{error, info};

#[cfg(feature = "relational")]
use crate::adapters::PoolConfig;
#[cfg(feature = "rocksdb")]
use crate::adapters::{RocksDbConfig, RocksDbStore};

/// Embedded store location when none is configured.
pub const DEFAULT_DB_PATH: &str = "./data/relay-store";

/// Where and how to open the store.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Embedded store directory. Empty means [`DEFAULT_DB_PATH`].
    pub path: String,
    /// Relational database URL (`postgres://...`, `sqlite://...`).
    pub url: Option<String>,
    /// Tenant scoping every relational row.
    pub tenant: Option<String>,
    #[cfg(feature = "relational")]
    pub pool: PoolConfig,
    /// Run embedded writes without fsync.
    pub relaxed_sync: bool,
}

impl StorageConfig {
    pub fn new(
        path: impl Into<String>,
        url: Option<String>,
        tenant: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            url: url.filter(|u| !u.trim().is_empty()),
            tenant: tenant.filter(|t| !t.trim().is_empty()),
            ..Default::default()
        }
    }

    pub fn embedded_path(&self) -> &str {
        if self.path.trim().is_empty() {
            DEFAULT_DB_PATH
        } else {
            &self.path
        }
    }
}

/// Open the configured provider.
///
/// Failures are logged here and returned; no provider is left half-open.
pub async fn configure_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn PersistenceProvider>, SetupError> {
    if let Some(url) = &config.url {
        let Some(tenant) = &config.tenant else {
            error!("[sr-01] Database URL configured without a tenant name");
            return Err(SetupError::MissingTenant);
        };
        return open_relational(url, tenant, config).await;
    }

    open_embedded(config)
}

#[cfg(feature = "relational")]
async fn open_relational(
    url: &str,
    tenant: &str,
    config: &StorageConfig,
) -> Result<Arc<dyn PersistenceProvider>, SetupError> {
    let store = crate::adapters::RelationalStore::connect(url, tenant, &config.pool)
        .await
        .map_err(|e| {
            error!("[sr-01] Relational store setup failed: {}", e);
            SetupError::Open(e)
        })?;
    info!("[sr-01] Using relational storage for tenant {}", tenant);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "relational"))]
async fn open_relational(
    _url: &str,
    _tenant: &str,
    _config: &StorageConfig,
) -> Result<Arc<dyn PersistenceProvider>, SetupError> {
    Err(SetupError::Open(crate::domain::StoreError::Open {
        message: "relational backend not compiled in".to_string(),
    }))
}

#[cfg(feature = "rocksdb")]
fn open_embedded(config: &StorageConfig) -> Result<Arc<dyn PersistenceProvider>, SetupError> {
    let path = config.embedded_path();
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                error!("[sr-01] Cannot create {}: {}", parent.display(), e);
                SetupError::Open(crate::domain::StoreError::Open {
                    message: format!("cannot create {}: {e}", parent.display()),
                })
            })?;
        }
    }

    let rocks_config = if config.relaxed_sync {
        RocksDbConfig::for_testing(path)
    } else {
        RocksDbConfig {
            path: path.to_string(),
            ..Default::default()
        }
    };
    let store = RocksDbStore::open(rocks_config).map_err(|e| {
        error!("[sr-01] Embedded store setup failed: {}", e);
        SetupError::Open(e)
    })?;
    info!("[sr-01] Using embedded storage at {}", path);
    Ok(Arc::new(store))
}

#[cfg(not(feature = "rocksdb"))]
fn open_embedded(_config: &StorageConfig) -> Result<Arc<dyn PersistenceProvider>, SetupError> {
    Err(SetupError::Open(crate::domain::StoreError::Open {
        message: "embedded backend not compiled in".to_string(),
    }))
}
