//! # Dispatch Context
//!
//! Every shared collaborator of the dispatcher, constructed once at startup
//! and handed to the engine and router.

use crate::ports::{PolicyEvaluator, Renderer};
use sr_01_persistence::{BookkeepingApi, BookkeepingService, PersistenceProvider};
use sr_02_dedup::DeduplicationStore;
use sr_03_aggregation::AggregationEngine;
use sr_05_scheduler::SchedulerRegistry;
use std::sync::Arc;

pub struct DispatchContext {
    pub provider: Arc<dyn PersistenceProvider>,
    pub dedup: DeduplicationStore,
    pub aggregation: AggregationEngine,
    pub bookkeeping: Arc<dyn BookkeepingApi>,
    pub schedulers: SchedulerRegistry,
    pub renderer: Arc<dyn Renderer>,
    pub policy: Arc<dyn PolicyEvaluator>,
}

impl DispatchContext {
    /// Wire the storage-backed components onto one provider.
    pub fn new(
        provider: Arc<dyn PersistenceProvider>,
        renderer: Arc<dyn Renderer>,
        policy: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        Self {
            dedup: DeduplicationStore::new(Arc::clone(&provider)),
            aggregation: AggregationEngine::new(Arc::clone(&provider)),
            bookkeeping: Arc::new(BookkeepingService::new(Arc::clone(&provider))),
            schedulers: SchedulerRegistry::new(),
            renderer,
            policy,
            provider,
        }
    }
}
