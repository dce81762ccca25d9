//! # Relay Container
//!
//! Opens the store and wires every component onto it.
//!
//! ## Build order
//!
//! 1. Read the settings file (if configured); it may name the tenant
//! 2. Open exactly one persistence provider
//! 3. Fall back to the stored settings snapshot when no file is given
//! 4. Issue a fresh API key
//! 5. Build the router and load routes, outputs and templates

pub mod config;

pub use config::{ConfigError, RelayConfig};

use crate::adapters::TemplateRenderer;
use anyhow::{Context, Result};
use shared_types::TenantSettings;
use sr_01_persistence::{configure_storage, PersistenceProvider};
use sr_04_reaper::RetentionConfig;
use sr_06_dispatch::{AcceptAll, DispatchContext, OutputFactory, Router};
use std::sync::Arc;
use tracing::info;

pub struct RelayContainer {
    pub provider: Arc<dyn PersistenceProvider>,
    pub router: Arc<Router>,
    pub retention: RetentionConfig,
}

impl RelayContainer {
    pub async fn build(config: &RelayConfig, factory: Arc<dyn OutputFactory>) -> Result<Self> {
        let file_settings = config.load_settings()?;

        let mut storage = config.storage.clone();
        if storage.tenant.is_none() {
            storage.tenant = file_settings
                .as_ref()
                .map(|s| s.name.clone())
                .filter(|name| !name.is_empty());
        }
        let provider = configure_storage(&storage)
            .await
            .context("Failed to open storage")?;
        info!("[relay] Storage ready ({:?} backend)", provider.backend());

        let ctx = Arc::new(DispatchContext::new(
            Arc::clone(&provider),
            Arc::new(TemplateRenderer),
            Arc::new(AcceptAll),
        ));

        let settings = match file_settings {
            Some(settings) => settings,
            None => {
                let json = ctx
                    .bookkeeping
                    .load_config_snapshot()
                    .await
                    .context("Failed to load stored settings")?;
                info!("[relay] No settings file, using stored snapshot");
                serde_json::from_str::<TenantSettings>(&json)
                    .context("Stored settings snapshot is corrupt")?
            }
        };

        ctx.bookkeeping
            .ensure_api_key()
            .await
            .context("Failed to issue API key")?;
        info!("[relay] API key issued");

        let retention =
            RetentionConfig::from_settings(settings.db_max_size, settings.sweep_interval_hours());

        let router = Arc::new(Router::new(ctx, factory));
        router
            .apply_settings(settings)
            .await
            .context("Invalid tenant settings")?;

        Ok(Self {
            provider,
            router,
            retention,
        })
    }
}
