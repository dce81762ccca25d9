//! Shared fixtures: one opened store per backend, and a wired router.

use serde_json::Map;
use shared_types::{OutputSettings, Route, RoutePlugins};
use sr_01_persistence::{
    InMemoryStore, PersistenceProvider, PoolConfig, RelationalStore, RocksDbConfig, RocksDbStore,
};
use sr_06_dispatch::test_utils::{FieldRenderer, RecordingFactory};
use sr_06_dispatch::{AcceptAll, DispatchContext, Router};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    RocksDb,
    Sqlite,
}

pub const ALL_BACKENDS: [Backend; 3] = [Backend::Memory, Backend::RocksDb, Backend::Sqlite];

/// An open provider plus the directory backing it.
pub struct TestStore {
    pub backend: Backend,
    pub provider: Arc<dyn PersistenceProvider>,
    _dir: Option<TempDir>,
}

pub async fn open_store(backend: Backend) -> TestStore {
    match backend {
        Backend::Memory => TestStore {
            backend,
            provider: Arc::new(InMemoryStore::new()),
            _dir: None,
        },
        Backend::RocksDb => {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("rocks").to_string_lossy().into_owned();
            let store = RocksDbStore::open(RocksDbConfig::for_testing(path)).unwrap();
            TestStore {
                backend,
                provider: Arc::new(store),
                _dir: Some(dir),
            }
        }
        Backend::Sqlite => {
            let dir = tempfile::tempdir().unwrap();
            let url = format!("sqlite://{}?mode=rwc", dir.path().join("relay.db").display());
            let store = RelationalStore::connect(&url, "tenant-a", &PoolConfig::for_testing())
                .await
                .unwrap();
            TestStore {
                backend,
                provider: Arc::new(store),
                _dir: Some(dir),
            }
        }
    }
}

pub fn make_router(provider: Arc<dyn PersistenceProvider>) -> (Arc<RecordingFactory>, Router) {
    let ctx = DispatchContext::new(provider, Arc::new(FieldRenderer), Arc::new(AcceptAll));
    let factory = RecordingFactory::new();
    let router = Router::new(Arc::new(ctx), factory.clone());
    (factory, router)
}

pub fn output(name: &str) -> OutputSettings {
    OutputSettings {
        name: name.to_string(),
        kind: "recording".to_string(),
        enable: true,
        template: String::new(),
        options: Map::new(),
    }
}

pub fn route(name: &str, outputs: &[&str], plugins: RoutePlugins) -> Route {
    Route {
        outputs: outputs.iter().map(|o| o.to_string()).collect(),
        plugins,
        ..Route::new(name)
    }
}
