//! # Router
//!
//! Registry of routes, outputs and templates, and the entry point for
//! inbound messages.
//!
//! ## Message flow
//!
//! ```text
//! raw ──▶ sanitize + parse (once)
//!             │
//!             ▼   for every route
//!     input callbacks ──any false──▶ drop for this route
//!             │
//!             ▼
//!     policy.evaluate ──false──▶ drop for this route
//!             │
//!             ▼   one task per bound output
//!     DispatchEngine::dispatch
//! ```
//!
//! Registry state sits behind one short-lived lock that is never held
//! across an await. Every registry change persists a settings snapshot
//! through the bookkeeping API.

mod flusher;

use crate::context::DispatchContext;
use crate::engine::{DispatchEngine, DispatchTarget, InboundMessage};
use crate::error::DispatchError;
use crate::ports::{InputCallback, Output, OutputFactory};
use flusher::RouteFlusher;
use parking_lot::RwLock;
use shared_types::{OutputSettings, Route, TemplateSettings, TenantSettings, DEFAULT_TEMPLATE};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

struct RegisteredOutput {
    settings: OutputSettings,
    /// `None` for disabled outputs.
    sink: Option<Arc<dyn Output>>,
}

#[derive(Default)]
pub(crate) struct RouterState {
    tenant: String,
    db_max_size: u64,
    db_test_interval: u64,
    routes: BTreeMap<String, Route>,
    outputs: BTreeMap<String, RegisteredOutput>,
    templates: BTreeMap<String, TemplateSettings>,
    callbacks: HashMap<String, Vec<InputCallback>>,
}

impl RouterState {
    fn snapshot(&self) -> TenantSettings {
        TenantSettings {
            name: self.tenant.clone(),
            db_max_size: self.db_max_size,
            db_test_interval: self.db_test_interval,
            input_routes: self.routes.values().cloned().collect(),
            outputs: self.outputs.values().map(|o| o.settings.clone()).collect(),
            templates: self.templates.values().cloned().collect(),
        }
    }

    /// Resolve an output name of `route` into a sink and its template.
    ///
    /// The output's template override wins over the route template.
    pub(crate) fn resolve(&self, route: &Route, output: &str) -> Result<DispatchTarget, DispatchError> {
        let registered = self
            .outputs
            .get(output)
            .ok_or_else(|| DispatchError::OutputNotFound(output.to_string()))?;
        let sink = registered
            .sink
            .clone()
            .ok_or_else(|| DispatchError::OutputNotFound(output.to_string()))?;

        let template_name = [registered.settings.template.as_str(), route.template.as_str()]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(DEFAULT_TEMPLATE);

        let template = match self.templates.get(template_name) {
            Some(template) => template.clone(),
            None if template_name == DEFAULT_TEMPLATE => TemplateSettings {
                name: DEFAULT_TEMPLATE.to_string(),
                body: String::new(),
            },
            None => return Err(DispatchError::TemplateNotFound(template_name.to_string())),
        };
        Ok(DispatchTarget::new(sink, template))
    }

    /// Every output of `route`, resolved or with the reason it could not be.
    pub(crate) fn targets(
        &self,
        route: &Route,
    ) -> Vec<(String, Result<DispatchTarget, DispatchError>)> {
        route
            .outputs
            .iter()
            .map(|name| (name.clone(), self.resolve(route, name)))
            .collect()
    }

    pub(crate) fn route(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }
}

pub struct Router {
    engine: Arc<DispatchEngine>,
    state: Arc<RwLock<RouterState>>,
    factory: Arc<dyn OutputFactory>,
}

impl Router {
    pub fn new(ctx: Arc<DispatchContext>, factory: Arc<dyn OutputFactory>) -> Self {
        Self {
            engine: Arc::new(DispatchEngine::new(ctx)),
            state: Arc::new(RwLock::new(RouterState::default())),
            factory,
        }
    }

    pub fn engine(&self) -> &Arc<DispatchEngine> {
        &self.engine
    }

    fn ctx(&self) -> &DispatchContext {
        self.engine.context()
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    /// Load a whole settings document: templates, then outputs, then routes.
    ///
    /// Fails on the first output that cannot be built or route whose
    /// timeouts cannot be parsed; nothing is registered in that case.
    pub async fn apply_settings(&self, settings: TenantSettings) -> Result<(), DispatchError> {
        let mut outputs = Vec::with_capacity(settings.outputs.len());
        for output in settings.outputs {
            let sink = self.build_output(&output)?;
            outputs.push(RegisteredOutput {
                settings: output,
                sink,
            });
        }
        let routes = settings
            .input_routes
            .into_iter()
            .map(Route::configure_timeouts)
            .collect::<Result<Vec<_>, _>>()?;

        let (replaced, output_count, template_count) = {
            let mut state = self.state.write();
            state.tenant = settings.name;
            state.db_max_size = settings.db_max_size;
            state.db_test_interval = settings.db_test_interval;
            for template in settings.templates {
                state.templates.insert(template.name.clone(), template);
            }
            let mut replaced = Vec::new();
            for output in outputs {
                if let Some(old) = state.outputs.insert(output.settings.name.clone(), output) {
                    replaced.extend(old.sink);
                }
            }
            for route in &routes {
                state.routes.insert(route.name.clone(), route.clone());
            }
            (replaced, state.outputs.len(), state.templates.len())
        };

        for route in &routes {
            self.sync_scheduler(route);
        }
        terminate_sinks(replaced).await;
        info!(
            "[sr-06] Loaded {} routes, {} outputs, {} templates",
            routes.len(),
            output_count,
            template_count
        );
        self.save_snapshot().await;
        Ok(())
    }

    /// The current registry as a settings document.
    pub fn settings(&self) -> TenantSettings {
        self.state.read().snapshot()
    }

    // =========================================================================
    // ROUTES
    // =========================================================================

    /// Register or replace a route and (re)start its flush timer.
    pub async fn add_route(&self, route: Route) -> Result<(), DispatchError> {
        let route = route.configure_timeouts()?;
        self.state
            .write()
            .routes
            .insert(route.name.clone(), route.clone());
        self.sync_scheduler(&route);
        info!("[sr-06] Route {} added", route.name);
        self.save_snapshot().await;
        Ok(())
    }

    /// Remove a route, stopping its timer. Buffered entries stay persisted.
    pub async fn remove_route(&self, name: &str) -> Result<Route, DispatchError> {
        let removed = {
            let mut state = self.state.write();
            state.callbacks.remove(name);
            state.routes.remove(name)
        };
        let route = removed.ok_or_else(|| DispatchError::RouteNotFound(name.to_string()))?;
        self.ctx().schedulers.stop_route(name);
        info!("[sr-06] Route {} removed", name);
        self.save_snapshot().await;
        Ok(route)
    }

    pub fn route(&self, name: &str) -> Option<Route> {
        self.state.read().routes.get(name).cloned()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.state.read().routes.values().cloned().collect()
    }

    /// Attach a pre-filter to `route`. All callbacks must accept a message
    /// before the policy sees it.
    pub fn add_input_callback(&self, route: &str, callback: InputCallback) -> Result<(), DispatchError> {
        let mut state = self.state.write();
        if !state.routes.contains_key(route) {
            return Err(DispatchError::RouteNotFound(route.to_string()));
        }
        state
            .callbacks
            .entry(route.to_string())
            .or_default()
            .push(callback);
        Ok(())
    }

    fn sync_scheduler(&self, route: &Route) {
        let interval = route.aggregation().interval_seconds;
        if interval == 0 {
            self.ctx().schedulers.stop_route(&route.name);
            return;
        }
        let handler = Arc::new(RouteFlusher::new(
            Arc::downgrade(&self.engine),
            Arc::downgrade(&self.state),
        ));
        self.ctx()
            .schedulers
            .start_route(&route.name, interval, handler);
    }

    // =========================================================================
    // OUTPUTS
    // =========================================================================

    /// Register or replace an output. Disabled outputs are kept in the
    /// settings but never built.
    pub async fn add_output(&self, settings: OutputSettings) -> Result<(), DispatchError> {
        let sink = self.build_output(&settings)?;
        let name = settings.name.clone();
        let replaced = self
            .state
            .write()
            .outputs
            .insert(name.clone(), RegisteredOutput { settings, sink });

        if let Some(old) = replaced {
            terminate_sinks(old.sink).await;
        }
        info!("[sr-06] Output {} added", name);
        self.save_snapshot().await;
        Ok(())
    }

    /// Terminate and remove an output, optionally unbinding it from every
    /// route.
    pub async fn remove_output(&self, name: &str, unbind: bool) -> Result<(), DispatchError> {
        let removed = {
            let mut state = self.state.write();
            let removed = state.outputs.remove(name);
            if removed.is_some() && unbind {
                for route in state.routes.values_mut() {
                    route.remove_output(name);
                }
            }
            removed
        };
        let removed = removed.ok_or_else(|| DispatchError::OutputNotFound(name.to_string()))?;

        terminate_sinks(removed.sink).await;
        info!("[sr-06] Output {} removed", name);
        self.save_snapshot().await;
        Ok(())
    }

    /// Render everything sent to `output` with `template`, whatever the
    /// route says.
    pub async fn set_output_template(&self, output: &str, template: &str) -> Result<(), DispatchError> {
        {
            let mut state = self.state.write();
            let registered = state
                .outputs
                .get_mut(output)
                .ok_or_else(|| DispatchError::OutputNotFound(output.to_string()))?;
            registered.settings.template = template.to_string();
        }
        self.save_snapshot().await;
        Ok(())
    }

    pub fn outputs(&self) -> Vec<OutputSettings> {
        self.state
            .read()
            .outputs
            .values()
            .map(|o| o.settings.clone())
            .collect()
    }

    fn build_output(&self, settings: &OutputSettings) -> Result<Option<Arc<dyn Output>>, DispatchError> {
        if !settings.enable {
            debug!("[sr-06] Output {} is disabled", settings.name);
            return Ok(None);
        }
        Ok(Some(self.factory.build(settings)?))
    }

    // =========================================================================
    // TEMPLATES
    // =========================================================================

    pub async fn add_template(&self, template: TemplateSettings) {
        let name = template.name.clone();
        self.state.write().templates.insert(name.clone(), template);
        info!("[sr-06] Template {} added", name);
        self.save_snapshot().await;
    }

    /// Remove a template. With `unbind`, routes and outputs naming it fall
    /// back to the default.
    pub async fn remove_template(&self, name: &str, unbind: bool) -> Result<(), DispatchError> {
        {
            let mut state = self.state.write();
            if state.templates.remove(name).is_none() {
                return Err(DispatchError::TemplateNotFound(name.to_string()));
            }
            if unbind {
                for route in state.routes.values_mut() {
                    if route.template == name {
                        route.template.clear();
                    }
                }
                for output in state.outputs.values_mut() {
                    if output.settings.template == name {
                        output.settings.template.clear();
                    }
                }
            }
        }
        info!("[sr-06] Template {} removed", name);
        self.save_snapshot().await;
        Ok(())
    }

    pub fn templates(&self) -> Vec<TemplateSettings> {
        self.state.read().templates.values().cloned().collect()
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Offer a raw message to every route.
    ///
    /// Only a malformed message is an error; per-route and per-output
    /// failures are logged.
    pub async fn handle(&self, raw: &[u8]) -> Result<(), DispatchError> {
        let inbound = Arc::new(InboundMessage::parse(raw)?);
        let routes: Vec<String> = self.state.read().routes.keys().cloned().collect();
        for route in routes {
            if let Err(e) = self.dispatch_route(&inbound, &route).await {
                warn!("[sr-06] Route {} skipped message: {}", route, e);
            }
        }
        Ok(())
    }

    /// Offer a raw message to one route.
    pub async fn handle_route(&self, route: &str, raw: &[u8]) -> Result<(), DispatchError> {
        let inbound = Arc::new(InboundMessage::parse(raw)?);
        self.dispatch_route(&inbound, route).await
    }

    /// Names of the routes whose callbacks and policy accept `raw`.
    pub fn evaluate(&self, raw: &[u8]) -> Result<Vec<String>, DispatchError> {
        let inbound = InboundMessage::parse(raw)?;
        let policy = &self.ctx().policy;
        let state = self.state.read();
        Ok(state
            .routes
            .values()
            .filter(|route| {
                state
                    .callbacks
                    .get(&route.name)
                    .map_or(true, |cbs| cbs.iter().all(|cb| cb(&inbound.message)))
                    && policy.evaluate(route, &inbound.message)
            })
            .map(|route| route.name.clone())
            .collect())
    }

    /// Dedup fingerprint of `raw` under `route`'s unique properties.
    pub fn message_fingerprint(&self, raw: &[u8], route: &str) -> Result<String, DispatchError> {
        let inbound = InboundMessage::parse(raw)?;
        let state = self.state.read();
        let route = state
            .routes
            .get(route)
            .ok_or_else(|| DispatchError::RouteNotFound(route.to_string()))?;
        Ok(sr_02_dedup::message_fingerprint(
            &inbound.message,
            &route.plugins.unique_message_props,
        ))
    }

    /// Send `raw` to every output of `route`, skipping dedup and
    /// aggregation. Returns the outputs that could not be reached.
    pub async fn send_with_retry(&self, raw: &[u8], route: &str) -> Result<Vec<String>, DispatchError> {
        let inbound = InboundMessage::parse(raw)?;
        let targets = {
            let state = self.state.read();
            let route = state
                .route(route)
                .ok_or_else(|| DispatchError::RouteNotFound(route.to_string()))?;
            state.targets(route)
        };

        let mut failed = Vec::new();
        for (name, target) in targets {
            let result = match target {
                Ok(target) => self.engine.send_direct(&inbound.message, &target).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!("[sr-06] Direct send on route {} to {} failed: {}", route, name, e);
                failed.push(name);
            }
        }
        Ok(failed)
    }

    /// [`send_with_retry`](Self::send_with_retry) that fails when any output
    /// failed. A route without outputs succeeds trivially.
    pub async fn send_by_route(&self, raw: &[u8], route: &str) -> Result<(), DispatchError> {
        let failed = self.send_with_retry(raw, route).await?;
        if failed.is_empty() {
            return Ok(());
        }
        Err(DispatchError::OutputsFailed {
            route: route.to_string(),
            outputs: failed,
        })
    }

    async fn dispatch_route(
        &self,
        inbound: &Arc<InboundMessage>,
        route_name: &str,
    ) -> Result<(), DispatchError> {
        let (route, callbacks, targets) = {
            let state = self.state.read();
            let route = state
                .route(route_name)
                .ok_or_else(|| DispatchError::RouteNotFound(route_name.to_string()))?;
            if route.outputs.is_empty() {
                debug!("[sr-06] Route {} has no outputs", route_name);
                return Ok(());
            }
            let callbacks = state.callbacks.get(route_name).cloned().unwrap_or_default();
            (route.clone(), callbacks, state.targets(route))
        };

        if !callbacks.iter().all(|cb| cb(&inbound.message)) {
            debug!("[sr-06] Input callback rejected message on route {}", route_name);
            return Ok(());
        }
        if !self.ctx().policy.evaluate(&route, &inbound.message) {
            debug!("[sr-06] Policy rejected message on route {}", route_name);
            return Ok(());
        }

        let route = Arc::new(route);
        let mut tasks = JoinSet::new();
        for (name, target) in targets {
            let target = match target {
                Ok(target) => target,
                Err(e) => {
                    warn!("[sr-06] Route {} skips output {}: {}", route.name, name, e);
                    continue;
                }
            };
            let engine = Arc::clone(&self.engine);
            let inbound = Arc::clone(inbound);
            let route = Arc::clone(&route);
            tasks.spawn(async move {
                let outcome = engine.dispatch(&inbound, &route, &target).await;
                (name, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((output, Ok(outcome))) => {
                    debug!("[sr-06] Route {} output {}: {:?}", route.name, output, outcome);
                }
                Ok((output, Err(e))) => {
                    warn!("[sr-06] Route {} output {} failed: {}", route.name, output, e);
                }
                Err(e) => error!("[sr-06] Dispatch task for route {} aborted: {}", route.name, e),
            }
        }
        Ok(())
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Stop every timer, then terminate every output.
    ///
    /// Timers are awaited so no flush races the terminations. Outputs stay
    /// registered in the settings but can no longer send.
    pub async fn terminate(&self) {
        self.ctx().schedulers.stop_all().await;
        let sinks: Vec<Arc<dyn Output>> = self
            .state
            .write()
            .outputs
            .values_mut()
            .filter_map(|o| o.sink.take())
            .collect();
        info!("[sr-06] Terminating {} outputs", sinks.len());
        terminate_sinks(sinks).await;
    }

    async fn save_snapshot(&self) {
        let snapshot = self.state.read().snapshot();
        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!("[sr-06] Cannot encode settings snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.ctx().bookkeeping.save_config_snapshot(&json).await {
            warn!("[sr-06] Cannot persist settings snapshot: {}", e);
        }
    }
}

async fn terminate_sinks(sinks: impl IntoIterator<Item = Arc<dyn Output>>) {
    for sink in sinks {
        if let Err(e) = sink.terminate().await {
            warn!("[sr-06] {}", e);
        }
    }
}
